//! Slack command/interactivity webhooks.
//!
//! Slack expects an ack within 3 seconds or it marks the command/action as
//! failed and may retry, so both handlers return immediately and do the
//! actual search/dispatch work in a spawned background task, exactly like
//! the Telegram webhook.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Form, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::chat::slack::{PaginationAction, SlackCommandHandler};
use crate::chat::ChatPublisher;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
}

async fn commands_handler(State(state): State<Arc<AppState>>, Form(command): Form<SlashCommand>) -> StatusCode {
    let Some(publisher) = state.slack_publisher.clone() else {
        return StatusCode::OK;
    };

    tokio::spawn(async move {
        let handler = SlackCommandHandler::new(&state, &*publisher);
        if let Err(err) = handler.handle_search(&command.channel_id, command.text.trim()).await {
            tracing::warn!(error = %err, "slack slash command failed");
            let _ = publisher
                .send_message(&command.channel_id, "Something went wrong running that search.", None)
                .await;
        }
    });

    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct ActionsForm {
    payload: String,
}

async fn actions_handler(State(state): State<Arc<AppState>>, Form(form): Form<ActionsForm>) -> StatusCode {
    let Some(publisher) = state.slack_publisher.clone() else {
        return StatusCode::OK;
    };

    let payload: Value = match serde_json::from_str(&form.payload) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "malformed slack interactivity payload");
            return StatusCode::OK;
        }
    };

    let Some(channel) = payload
        .get("channel")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        return StatusCode::OK;
    };
    let message_ts = payload
        .get("message")
        .and_then(|m| m.get("ts"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let Some(action) = payload.get("actions").and_then(|a| a.as_array()).and_then(|a| a.first()) else {
        return StatusCode::OK;
    };
    let action_id = action.get("action_id").and_then(Value::as_str).unwrap_or_default().to_string();
    let selected_value = action
        .get("selected_option")
        .and_then(|o| o.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string);

    tokio::spawn(async move {
        let handler = SlackCommandHandler::new(&state, &*publisher);
        let result = if let Some(action) = PaginationAction::from_action_id(&action_id) {
            match message_ts {
                Some(ts) => handler.handle_pagination(&channel, &ts, action).await,
                None => Ok(()),
            }
        } else if action_id == "search_session_overflow" {
            match selected_value.as_deref().and_then(|v| v.split_once(':')) {
                Some(("watch", session_id)) => handler.handle_watch(&channel, session_id, &channel).await,
                Some(("preview", session_id)) => handler.handle_preview(&channel, session_id).await,
                _ => Ok(()),
            }
        } else {
            Ok(())
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "slack interactivity action failed");
            let _ = publisher.send_message(&channel, "Something went wrong handling that action.", None).await;
        }
    });

    StatusCode::OK
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook/slack/commands", post(commands_handler))
        .route("/webhook/slack/actions", post(actions_handler))
}
