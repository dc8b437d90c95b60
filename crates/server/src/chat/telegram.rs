//! Telegram bot command dispatch: `/search ...`, plus the inline keyboard
//! attached to a result message. Callback data uses a short grammar so it
//! fits Telegram's 64-byte limit:
//!
//! - `w:<i>` — watch the session at index `i` of the current page
//! - `p:<i>` — preview the session at index `i` of the current page
//! - `s:n` / `s:p` / `s:r` — next page / previous page / refresh
//! - `stop:<session_id>` — stop watching a session in this chat
//! - `noop` — a disabled button (page indicator), acknowledged but inert

use std::sync::Arc;

use serde_json::{json, Value};
use session_watch_types::{DestinationKind, Session};

use crate::chat::{format_date, format_duration, format_file_size, truncate, ChatError, ChatPublisher, PAGE_SIZE};
use crate::destinations::DEFAULT_REPLAY_COUNT;
use crate::search_state::{SearchState, SearchStateStore};
use crate::state::AppState;

const MAX_SUMMARY_CHARS: usize = 120;

pub enum Callback {
    Watch(usize),
    Preview(usize),
    NextPage,
    PrevPage,
    Refresh,
    Stop(String),
    Noop,
}

impl Callback {
    pub fn parse(data: &str) -> Option<Self> {
        if data == "noop" {
            return Some(Self::Noop);
        }
        if let Some(idx) = data.strip_prefix("w:") {
            return idx.parse().ok().map(Self::Watch);
        }
        if let Some(idx) = data.strip_prefix("p:") {
            return idx.parse().ok().map(Self::Preview);
        }
        if let Some(session_id) = data.strip_prefix("stop:") {
            return Some(Self::Stop(session_id.to_string()));
        }
        match data {
            "s:n" => Some(Self::NextPage),
            "s:p" => Some(Self::PrevPage),
            "s:r" => Some(Self::Refresh),
            _ => None,
        }
    }
}

/// Escape the characters MarkdownV2 treats as formatting tokens.
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub struct TelegramCommandHandler<'a> {
    state: &'a AppState,
    publisher: &'a (dyn ChatPublisher + Sync),
}

impl<'a> TelegramCommandHandler<'a> {
    pub fn new(state: &'a AppState, publisher: &'a (dyn ChatPublisher + Sync)) -> Self {
        Self { state, publisher }
    }

    pub async fn handle_search(&self, chat_id: &str, query: &str) -> Result<(), ChatError> {
        if !self.state.chat_limiter.check(chat_id) {
            self.publisher
                .send_message(chat_id, &escape_markdown("Too many searches — try again in a minute."), None)
                .await?;
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
            chat_id,
            SearchState::new(query.to_string(), results.sessions.clone(), PAGE_SIZE),
        );

        let (text, keyboard) = render_page(&self.state.search_states, chat_id);
        self.publisher.send_message(chat_id, &text, Some(keyboard)).await?;
        Ok(())
    }

    pub async fn handle_callback(&self, chat_id: &str, message_id: &str, data: &str) -> Result<(), ChatError> {
        match Callback::parse(data) {
            Some(Callback::Noop) | None => Ok(()),
            Some(Callback::Watch(idx)) => self.handle_watch(chat_id, message_id, idx).await,
            Some(Callback::Preview(idx)) => self.handle_preview(chat_id, message_id, idx).await,
            Some(Callback::NextPage) => self.paginate(chat_id, message_id, Paginate::Next).await,
            Some(Callback::PrevPage) => self.paginate(chat_id, message_id, Paginate::Prev).await,
            Some(Callback::Refresh) => self.paginate(chat_id, message_id, Paginate::Refresh).await,
            Some(Callback::Stop(session_id)) => self.handle_stop_watching(chat_id, message_id, &session_id).await,
        }
    }

    async fn paginate(&self, chat_id: &str, message_id: &str, direction: Paginate) -> Result<(), ChatError> {
        let Some(search_state) = self.state.search_states.get(chat_id) else {
            self.publisher
                .update_message(chat_id, message_id, "This search has expired. Start a new one.", None)
                .await?;
            return Ok(());
        };

        match direction {
            Paginate::Next if search_state.has_next_page() => {
                self.state
                    .search_states
                    .update_offset(chat_id, search_state.offset + search_state.page_size);
            }
            Paginate::Prev if search_state.has_prev_page() => {
                self.state
                    .search_states
                    .update_offset(chat_id, search_state.offset.saturating_sub(search_state.page_size));
            }
            Paginate::Refresh => {
                let params = session_watch_search::query::parse(&search_state.query);
                let index = self
                    .state
                    .indexer
                    .get_index()
                    .await
                    .map_err(|err| ChatError::Request(err.to_string()))?;
                let results = self.state.search_engine.search(&index, &params);
                self.state.search_states.save(
                    chat_id,
                    SearchState::new(search_state.query.clone(), results.sessions, search_state.page_size),
                );
            }
            _ => {}
        }

        let (text, keyboard) = render_page(&self.state.search_states, chat_id);
        self.publisher.update_message(chat_id, message_id, &text, Some(keyboard)).await?;
        Ok(())
    }

    async fn handle_watch(&self, chat_id: &str, message_id: &str, page_index: usize) -> Result<(), ChatError> {
        let Some(session) = self
            .state
            .search_states
            .get(chat_id)
            .and_then(|s| s.session_at_index(page_index).cloned())
        else {
            return Ok(());
        };

        let attached = self.state.destinations.attach(
            &session.session_id,
            &session.file_path,
            DestinationKind::ChatA,
            chat_id,
            DEFAULT_REPLAY_COUNT,
        );
        let confirmation = if attached {
            format!("Watching *{}*\\.", escape_markdown(&session.project_display_name))
        } else {
            "Already watching that session\\.".to_string()
        };
        self.publisher.update_message(chat_id, message_id, &confirmation, None).await?;
        Ok(())
    }

    async fn handle_preview(&self, chat_id: &str, message_id: &str, page_index: usize) -> Result<(), ChatError> {
        let Some(session) = self
            .state
            .search_states
            .get(chat_id)
            .and_then(|s| s.session_at_index(page_index).cloned())
        else {
            return Ok(());
        };
        let events = self.state.preview_provider.preview(&session);
        self.publisher
            .update_message(chat_id, message_id, &format_preview(&session, &events), None)
            .await?;
        Ok(())
    }

    async fn handle_stop_watching(&self, chat_id: &str, message_id: &str, session_id: &str) -> Result<(), ChatError> {
        let stopped = self.state.destinations.detach(session_id, DestinationKind::ChatA, chat_id);
        let text = if stopped {
            "Stopped watching that session\\."
        } else {
            "You weren't watching that session\\."
        };
        self.publisher.update_message(chat_id, message_id, text, None).await?;
        Ok(())
    }
}

enum Paginate {
    Next,
    Prev,
    Refresh,
}

fn render_page(store: &SearchStateStore, chat_id: &str) -> (String, Value) {
    let empty_keyboard = || json!({ "inline_keyboard": Vec::<Vec<Value>>::new() });
    match store.get(chat_id) {
        Some(search_state) if !search_state.sessions.is_empty() => {
            let page = search_state.get_page();
            let text = format_search_results(&search_state.query, page, search_state.offset, search_state.sessions.len());
            let keyboard = build_keyboard(page, search_state.has_prev_page(), search_state.has_next_page());
            (text, keyboard)
        }
        Some(search_state) => (
            format!("No sessions found for *{}*\\.", escape_markdown(&search_state.query)),
            empty_keyboard(),
        ),
        None => ("This search has expired\\. Start a new one\\.".to_string(), empty_keyboard()),
    }
}

fn format_search_results(query: &str, page: &[Session], offset: usize, total: usize) -> String {
    let mut text = format!("*{total} session\\(s\\) for* \"{}\"\n\n", escape_markdown(query));
    for (i, session) in page.iter().enumerate() {
        let summary = session
            .summary
            .as_deref()
            .map(|s| escape_markdown(&truncate(s, MAX_SUMMARY_CHARS)))
            .unwrap_or_else(|| "_no summary_".to_string());
        let duration = session_watch_core::metadata::duration_ms(&session.file_path).ok().flatten();
        text.push_str(&format!(
            "{}\\. *{}*\n{}\n{} · {} · {}\n\n",
            offset + i + 1,
            escape_markdown(&session.project_display_name),
            summary,
            format_date(session.modified_at),
            format_file_size(session.size_bytes),
            format_duration(duration),
        ));
    }
    text
}

fn build_keyboard(page: &[Session], has_prev: bool, has_next: bool) -> Value {
    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (i, _session) in page.iter().enumerate() {
        rows.push(vec![
            json!({ "text": format!("Watch #{}", i + 1), "callback_data": format!("w:{i}") }),
            json!({ "text": format!("Preview #{}", i + 1), "callback_data": format!("p:{i}") }),
        ]);
    }

    rows.push(vec![
        nav_button("◀ Prev", "s:p", has_prev),
        json!({ "text": "·", "callback_data": "noop" }),
        nav_button("Next ▶", "s:n", has_next),
    ]);
    rows.push(vec![json!({ "text": "⟳ Refresh", "callback_data": "s:r" })]);

    json!({ "inline_keyboard": rows })
}

fn nav_button(label: &str, callback_data: &str, enabled: bool) -> Value {
    if enabled {
        json!({ "text": label, "callback_data": callback_data })
    } else {
        json!({ "text": label, "callback_data": "noop" })
    }
}

fn format_preview(session: &Session, events: &[crate::preview::PreviewEvent]) -> String {
    let mut text = format!("*{}*\n", escape_markdown(&session.project_display_name));
    for event in events {
        match &event.detail {
            Some(detail) => text.push_str(&format!("• {}: {}\n", escape_markdown(&event.label), escape_markdown(detail))),
            None => text.push_str(&format!("• {}: _none yet_\n", escape_markdown(&event.label))),
        }
    }
    text
}

/// A [`ChatPublisher`] backed by the Telegram Bot API, gated on a bot token
/// supplied at startup.
pub struct TelegramPublisher {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramPublisher {
    pub fn new(bot_token: String) -> Arc<Self> {
        Arc::new(Self {
            bot_token,
            client: reqwest::Client::new(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }
}

#[async_trait::async_trait]
impl ChatPublisher for TelegramPublisher {
    async fn send_message(&self, destination: &str, text: &str, markup: Option<Value>) -> Result<String, ChatError> {
        let mut body = json!({ "chat_id": destination, "text": text, "parse_mode": "MarkdownV2" });
        if let Some(keyboard) = markup {
            body["reply_markup"] = keyboard;
        }

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|err| ChatError::Request(err.to_string()))?;

        let payload: Value = response.json().await.map_err(|err| ChatError::Request(err.to_string()))?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(ChatError::Request(payload.get("description").and_then(Value::as_str).unwrap_or("unknown").to_string()));
        }
        let message_id = payload
            .get("result")
            .and_then(|r| r.get("message_id"))
            .and_then(Value::as_i64)
            .unwrap_or_default();
        Ok(message_id.to_string())
    }

    async fn update_message(&self, destination: &str, message_id: &str, text: &str, markup: Option<Value>) -> Result<(), ChatError> {
        let mut body = json!({ "chat_id": destination, "message_id": message_id, "text": text, "parse_mode": "MarkdownV2" });
        if let Some(keyboard) = markup {
            body["reply_markup"] = keyboard;
        }

        let response = self
            .client
            .post(self.api_url("editMessageText"))
            .json(&body)
            .send()
            .await
            .map_err(|err| ChatError::Request(err.to_string()))?;

        let payload: Value = response.json().await.map_err(|err| ChatError::Request(err.to_string()))?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(ChatError::Request(payload.get("description").and_then(Value::as_str).unwrap_or("unknown").to_string()));
        }
        Ok(())
    }
}
