//! POST /webhook/telegram — Telegram Bot API webhook. Accepts an `Update`,
//! acknowledges it immediately with 200 OK, and processes the command or
//! callback in the background, per spec's immediate-response contract:
//! Telegram retries a webhook delivery that doesn't get a prompt 2xx, and a
//! search can take longer than we want to make Telegram wait.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use crate::chat::telegram::TelegramCommandHandler;
use crate::chat::ChatPublisher;
use crate::destinations::make_telegram_identifier;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[allow(dead_code)]
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub message_thread_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramCallbackQuery {
    pub message: Option<TelegramCallbackMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramCallbackMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub message_thread_id: Option<i64>,
}

/// Strip a leading `/search` (optionally `/search@botname`) command token,
/// returning the rest of the text as the query. Any other text is treated
/// as an implicit search, matching a bot UX where the command prefix is
/// optional once a user is already in a DM with the bot.
fn extract_search_query(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return trimmed.to_string();
    };
    match rest.split_once(char::is_whitespace) {
        Some((command, query)) if command.eq_ignore_ascii_case("search") || command.starts_with("search@") => {
            query.trim().to_string()
        }
        None if rest.eq_ignore_ascii_case("search") => String::new(),
        _ => trimmed.to_string(),
    }
}

async fn webhook_handler(State(state): State<Arc<AppState>>, Json(update): Json<TelegramUpdate>) -> StatusCode {
    let Some(publisher) = state.telegram_publisher.clone() else {
        return StatusCode::OK;
    };

    if let Some(message) = update.message {
        let Some(text) = message.text else {
            return StatusCode::OK;
        };
        let query = extract_search_query(&text);
        let chat_key = make_telegram_identifier(message.chat.id, message.message_thread_id);
        tokio::spawn(async move {
            let handler = TelegramCommandHandler::new(&state, &*publisher);
            if let Err(err) = handler.handle_search(&chat_key, &query).await {
                tracing::warn!(error = %err, "telegram search command failed");
                let _ = publisher.send_message(&chat_key, "Something went wrong running that search.", None).await;
            }
        });
        return StatusCode::OK;
    }

    if let Some(callback) = update.callback_query {
        let (Some(message), Some(data)) = (callback.message, callback.data) else {
            return StatusCode::OK;
        };
        let chat_key = make_telegram_identifier(message.chat.id, message.message_thread_id);
        let message_id = message.message_id.to_string();
        tokio::spawn(async move {
            let handler = TelegramCommandHandler::new(&state, &*publisher);
            if let Err(err) = handler.handle_callback(&chat_key, &message_id, &data).await {
                tracing::warn!(error = %err, "telegram callback handling failed");
                let _ = publisher.send_message(&chat_key, "Something went wrong handling that action.", None).await;
            }
        });
    }

    StatusCode::OK
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/telegram", post(webhook_handler))
}
