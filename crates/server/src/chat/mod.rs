//! Shared plumbing for the two chat command surfaces (Telegram, Slack):
//! a minimal publisher abstraction so the formatting/dispatch logic in
//! [`telegram`] and [`slack`] can be tested without a live bot token.

pub mod slack;
pub mod telegram;

use thiserror::Error;

/// Results shown per page of a paginated search result set, matching both
/// surfaces' inline-keyboard / Block Kit page size.
pub const PAGE_SIZE: usize = 5;

/// Per-user/channel search command rate limit.
pub const SEARCH_RATE_LIMIT: usize = 10;
pub const SEARCH_RATE_WINDOW_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat API request failed: {0}")]
    Request(String),
}

/// Sends and edits messages on a chat surface. Implemented once per
/// surface; the Telegram/Slack HTTP calls live behind `reqwest`, gated on
/// the relevant bot token being configured — formatting and dispatch logic
/// never touch the network directly, which keeps them unit-testable.
#[async_trait::async_trait]
pub trait ChatPublisher: Send + Sync {
    /// Send a new message, returning an opaque id the surface can later use
    /// to edit it (a Telegram message id, a Slack message `ts`). `markup` is
    /// the surface-native keyboard/blocks payload (an inline keyboard for
    /// Telegram, Block Kit blocks for Slack) serialized as JSON so both
    /// surfaces can share one trait shape.
    async fn send_message(&self, destination: &str, text: &str, markup: Option<serde_json::Value>) -> Result<String, ChatError>;

    async fn update_message(
        &self,
        destination: &str,
        message_id: &str,
        text: &str,
        markup: Option<serde_json::Value>,
    ) -> Result<(), ChatError>;
}

/// Truncate `text` to at most `max_chars` characters, appending `…` if it
/// was cut. Operates on char boundaries so multi-byte text isn't split
/// mid-codepoint.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes < 1024 {
        format!("{size_bytes} B")
    } else if size_bytes < 1024 * 1024 {
        format!("{:.1} KB", size_bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size_bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn format_duration(duration_ms: Option<i64>) -> String {
    let Some(duration_ms) = duration_ms else {
        return "?".to_string();
    };
    let seconds = duration_ms / 1000;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let hours = minutes / 60;
    let remaining_minutes = minutes % 60;
    format!("{hours}h {remaining_minutes}m")
}

pub fn format_date(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%b %d").to_string()
}
