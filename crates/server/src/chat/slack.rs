//! Slack slash-command dispatch: `/sessions search ...`, plus the overflow
//! menu (`watch:<i>`, `preview:<i>`) and pagination buttons
//! (`search_prev`/`search_next`/`search_refresh`) attached to a search
//! result message.
//!
//! Formatting targets Slack's `mrkdwn` and Block Kit; building blocks here
//! rather than in the handler keeps the handler testable without a
//! `ChatPublisher`.

use std::sync::Arc;

use serde_json::{json, Value};
use session_watch_types::{DestinationKind, Session};

use crate::chat::{format_date, format_duration, format_file_size, truncate, ChatError, ChatPublisher, PAGE_SIZE};
use crate::destinations::DEFAULT_REPLAY_COUNT;
use crate::search_state::{SearchState, SearchStateStore};
use crate::state::AppState;

const MAX_SUMMARY_CHARS: usize = 120;

pub enum PaginationAction {
    Next,
    Prev,
    Refresh,
}

impl PaginationAction {
    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            "search_next" => Some(Self::Next),
            "search_prev" => Some(Self::Prev),
            "search_refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

/// Escape Slack's three `mrkdwn` special characters. Must run before any
/// markdown-significant characters (`*`, `_`, backtick) are added, never
/// after, or the formatting markup itself gets escaped.
pub fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub struct SlackCommandHandler<'a> {
    state: &'a AppState,
    publisher: &'a (dyn ChatPublisher + Sync),
}

impl<'a> SlackCommandHandler<'a> {
    pub fn new(state: &'a AppState, publisher: &'a (dyn ChatPublisher + Sync)) -> Self {
        Self { state, publisher }
    }

    pub async fn handle_search(&self, channel: &str, query: &str) -> Result<(), ChatError> {
        if !self.state.chat_limiter.check(channel) {
            let (text, blocks) = format_rate_limited();
            self.publisher.send_message(channel, &text, Some(blocks)).await?;
            return Ok(());
        }

        let params = session_watch_search::query::parse(query);
        let index = self
            .state
            .indexer
            .get_index()
            .await
            .map_err(|err| ChatError::Request(err.to_string()))?;
        let results = self.state.search_engine.search(&index, &params);

        self.state.search_states.save(
            channel,
            SearchState::new(query.to_string(), results.sessions.clone(), PAGE_SIZE),
        );

        let (text, blocks) = render_page(query, &self.state.search_states, channel);
        self.publisher.send_message(channel, &text, Some(blocks)).await?;
        Ok(())
    }

    pub async fn handle_pagination(&self, channel: &str, message_ts: &str, action: PaginationAction) -> Result<(), ChatError> {
        let Some(search_state) = self.state.search_states.get(channel) else {
            self.publisher
                .update_message(channel, message_ts, "This search has expired. Start a new one.", None)
                .await?;
            return Ok(());
        };

        match action {
            PaginationAction::Next if search_state.has_next_page() => {
                self.state
                    .search_states
                    .update_offset(channel, search_state.offset + search_state.page_size);
            }
            PaginationAction::Prev if search_state.has_prev_page() => {
                self.state
                    .search_states
                    .update_offset(channel, search_state.offset.saturating_sub(search_state.page_size));
            }
            PaginationAction::Refresh => {
                let params = session_watch_search::query::parse(&search_state.query);
                let index = self
                    .state
                    .indexer
                    .get_index()
                    .await
                    .map_err(|err| ChatError::Request(err.to_string()))?;
                let results = self.state.search_engine.search(&index, &params);
                self.state.search_states.save(
                    channel,
                    SearchState::new(search_state.query.clone(), results.sessions, search_state.page_size),
                );
            }
            _ => {}
        }

        let (text, blocks) = render_page(&search_state.query, &self.state.search_states, channel);
        self.publisher.update_message(channel, message_ts, &text, Some(blocks)).await?;
        Ok(())
    }

    pub async fn handle_watch(&self, channel: &str, session_id: &str, identifier: &str) -> Result<(), ChatError> {
        let session = match self.state.indexer.get_session(session_id).await {
            Ok(session) => session,
            Err(_) => {
                self.publisher
                    .send_message(channel, &format_error("that session no longer exists"), None)
                    .await?;
                return Ok(());
            }
        };

        let attached = self.state.destinations.attach(
            session_id,
            &session.file_path,
            DestinationKind::ChatB,
            identifier,
            DEFAULT_REPLAY_COUNT,
        );
        let text = format_watch_confirmation(&session, attached);
        self.publisher.send_message(channel, &text, None).await?;
        Ok(())
    }

    pub async fn handle_preview(&self, channel: &str, session_id: &str) -> Result<(), ChatError> {
        let session = match self.state.indexer.get_session(session_id).await {
            Ok(session) => session,
            Err(_) => {
                self.publisher
                    .send_message(channel, &format_error("that session no longer exists"), None)
                    .await?;
                return Ok(());
            }
        };
        let events = self.state.preview_provider.preview(&session);
        self.publisher.send_message(channel, &format_preview(&session, &events), None).await?;
        Ok(())
    }
}

fn render_page(query: &str, store: &SearchStateStore, channel: &str) -> (String, Value) {
    match store.get(channel) {
        Some(search_state) if !search_state.sessions.is_empty() => {
            format_search_results(query, search_state.get_page(), search_state.offset, search_state.sessions.len(), search_state.has_prev_page(), search_state.has_next_page())
        }
        _ => format_empty_results(query),
    }
}

fn format_search_results(
    query: &str,
    page: &[Session],
    offset: usize,
    total: usize,
    has_prev: bool,
    has_next: bool,
) -> (String, Value) {
    let text = format!("Found {total} session(s) for \"{}\"", escape_mrkdwn(query));
    let mut blocks = vec![json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": format!("*{}*", text) }
    })];

    for session in page {
        let summary = session
            .summary
            .as_deref()
            .map(|s| escape_mrkdwn(&truncate(s, MAX_SUMMARY_CHARS)))
            .unwrap_or_else(|| "_no summary_".to_string());
        let duration = session_watch_core::metadata::duration_ms(&session.file_path).ok().flatten();
        let detail = format!(
            "{} · {} · {}",
            format_date(session.modified_at),
            format_file_size(session.size_bytes),
            format_duration(duration),
        );
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*{}*\n{}\n{}", escape_mrkdwn(&session.project_display_name), summary, detail) },
            "accessory": {
                "type": "overflow",
                "action_id": "search_session_overflow",
                "options": [
                    { "text": { "type": "plain_text", "text": "Watch" }, "value": format!("watch:{}", session.session_id) },
                    { "text": { "type": "plain_text", "text": "Preview" }, "value": format!("preview:{}", session.session_id) },
                ]
            }
        }));
    }

    blocks.push(json!({
        "type": "actions",
        "elements": [
            pagination_button("◀ Prev", "search_prev", has_prev),
            { "type": "button", "action_id": "search_page_indicator", "text": { "type": "plain_text", "text": format!("{}-{} of {total}", offset + 1, (offset + page.len()).min(total)) } },
            pagination_button("Next ▶", "search_next", has_next),
            { "type": "button", "action_id": "search_refresh", "text": { "type": "plain_text", "text": "⟳ Refresh" } },
        ]
    }));

    (text, json!(blocks))
}

fn pagination_button(label: &str, action_id: &str, enabled: bool) -> Value {
    if enabled {
        json!({ "type": "button", "action_id": action_id, "text": { "type": "plain_text", "text": label } })
    } else {
        json!({ "type": "button", "action_id": format!("{action_id}_disabled"), "text": { "type": "plain_text", "text": label }, "style": "disabled" })
    }
}

fn format_empty_results(query: &str) -> (String, Value) {
    let text = format!("No sessions found for \"{}\"", escape_mrkdwn(query));
    (
        text.clone(),
        json!([{ "type": "section", "text": { "type": "mrkdwn", "text": text } }]),
    )
}

fn format_rate_limited() -> (String, Value) {
    let text = "Too many searches — try again in a minute.".to_string();
    (
        text.clone(),
        json!([{ "type": "section", "text": { "type": "mrkdwn", "text": format!(":hourglass: {text}") } }]),
    )
}

fn format_watch_confirmation(session: &Session, attached: bool) -> String {
    if attached {
        format!(
            "Watching *{}* — you'll hear about new activity here.",
            escape_mrkdwn(&session.project_display_name)
        )
    } else {
        "Already watching that session in this channel.".to_string()
    }
}

fn format_preview(session: &Session, events: &[crate::preview::PreviewEvent]) -> String {
    let mut text = format!("*{}*\n", escape_mrkdwn(&session.project_display_name));
    for event in events {
        match &event.detail {
            Some(detail) => text.push_str(&format!("• {}: {}\n", event.label, escape_mrkdwn(detail))),
            None => text.push_str(&format!("• {}: _none yet_\n", event.label)),
        }
    }
    text
}

fn format_error(message: &str) -> String {
    format!(":warning: {}", escape_mrkdwn(message))
}

/// A [`ChatPublisher`] backed by Slack's `chat.postMessage` / `chat.update`
/// Web API, gated on a bot token supplied at startup.
pub struct SlackPublisher {
    bot_token: String,
    client: reqwest::Client,
}

impl SlackPublisher {
    pub fn new(bot_token: String) -> Arc<Self> {
        Arc::new(Self {
            bot_token,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl ChatPublisher for SlackPublisher {
    async fn send_message(&self, destination: &str, text: &str, markup: Option<Value>) -> Result<String, ChatError> {
        let mut body = json!({ "channel": destination, "text": text });
        if let Some(blocks) = markup {
            body["blocks"] = blocks;
        }

        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ChatError::Request(err.to_string()))?;

        let payload: Value = response.json().await.map_err(|err| ChatError::Request(err.to_string()))?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(ChatError::Request(payload.get("error").and_then(Value::as_str).unwrap_or("unknown").to_string()));
        }
        Ok(payload.get("ts").and_then(Value::as_str).unwrap_or_default().to_string())
    }

    async fn update_message(&self, destination: &str, message_id: &str, text: &str, markup: Option<Value>) -> Result<(), ChatError> {
        let mut body = json!({ "channel": destination, "ts": message_id, "text": text });
        if let Some(blocks) = markup {
            body["blocks"] = blocks;
        }

        let response = self
            .client
            .post("https://slack.com/api/chat.update")
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ChatError::Request(err.to_string()))?;

        let payload: Value = response.json().await.map_err(|err| ChatError::Request(err.to_string()))?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(ChatError::Request(payload.get("error").and_then(Value::as_str).unwrap_or("unknown").to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_mrkdwn_escapes_the_three_special_characters() {
        assert_eq!(escape_mrkdwn("a & b <c> d"), "a &amp; b &lt;c&gt; d");
    }

    #[test]
    fn pagination_action_parses_known_action_ids() {
        assert!(matches!(PaginationAction::from_action_id("search_next"), Some(PaginationAction::Next)));
        assert!(matches!(PaginationAction::from_action_id("search_prev"), Some(PaginationAction::Prev)));
        assert!(PaginationAction::from_action_id("unknown").is_none());
    }

    #[test]
    fn format_watch_confirmation_distinguishes_fresh_from_duplicate() {
        let session = Session {
            session_id: "s1".into(),
            project_encoded: "-tmp".into(),
            project_display_name: "trello".into(),
            file_path: "/tmp/s1.jsonl".into(),
            summary: None,
            created_at: chrono::Utc::now(),
            modified_at: chrono::Utc::now(),
            size_bytes: 0,
            line_count: 0,
            has_subagents: false,
        };
        assert!(format_watch_confirmation(&session, true).contains("Watching"));
        assert!(format_watch_confirmation(&session, false).contains("Already watching"));
    }

    #[test]
    fn format_empty_results_includes_the_query() {
        let (text, _) = format_empty_results("auth bug");
        assert!(text.contains("auth bug"));
    }

    #[test]
    fn pagination_button_marks_disabled_state() {
        let button = pagination_button("Next", "search_next", false);
        assert_eq!(button["action_id"], "search_next_disabled");
    }
}
