//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Duration;

use session_watch_core::Indexer;
use session_watch_search::SearchEngine;

use crate::chat::ChatPublisher;
use crate::destinations::DestinationManager;
use crate::preview::{PreviewProvider, SummaryPreviewProvider};
use crate::rate_limiter::RateLimiter;
use crate::search_state::SearchStateStore;

/// Shared application state accessible from all route handlers and both
/// chat command handlers.
///
/// Each HTTP endpoint in the spec's rate-limit table gets its own
/// [`RateLimiter`] instance rather than sharing one bucket config, since
/// `/search`+`/projects` (30/min), `/sessions/{id}/preview` (60/min) and
/// `/index/refresh` (1/60s, single global key) all have distinct rates.
pub struct AppState {
    pub indexer: Arc<Indexer>,
    pub search_engine: SearchEngine,
    /// `api:<ip>`, shared by `GET /search` and `GET /projects` (30/min).
    pub search_limiter: RateLimiter,
    /// `api:<ip>`, `GET /sessions/{id}/preview` (60/min).
    pub preview_limiter: RateLimiter,
    /// `global:refresh`, `POST /index/refresh` (1/60s).
    pub refresh_limiter: RateLimiter,
    /// `chat-a:<user>` / `chat-b:<chat[:thread]>`, chat commands (10/min).
    pub chat_limiter: RateLimiter,
    pub search_states: SearchStateStore,
    pub destinations: Arc<DestinationManager>,
    pub preview_provider: Arc<dyn PreviewProvider>,
    pub telegram_bot_token: Option<String>,
    pub slack_bot_token: Option<String>,
    /// Set iff `telegram_bot_token` is configured — lets the webhook route
    /// reply and edit messages without building a fresh client per request.
    pub telegram_publisher: Option<Arc<dyn ChatPublisher>>,
    /// Set iff `slack_bot_token` is configured.
    pub slack_publisher: Option<Arc<dyn ChatPublisher>>,
}

impl AppState {
    pub fn new(
        indexer: Arc<Indexer>,
        destinations: Arc<DestinationManager>,
        telegram_bot_token: Option<String>,
        slack_bot_token: Option<String>,
    ) -> Arc<Self> {
        let telegram_publisher = telegram_bot_token
            .clone()
            .map(|token| crate::chat::telegram::TelegramPublisher::new(token) as Arc<dyn ChatPublisher>);
        let slack_publisher = slack_bot_token
            .clone()
            .map(|token| crate::chat::slack::SlackPublisher::new(token) as Arc<dyn ChatPublisher>);

        Arc::new(Self {
            indexer,
            search_engine: SearchEngine::new(),
            search_limiter: RateLimiter::new(30, Duration::from_secs(60)),
            preview_limiter: RateLimiter::new(60, Duration::from_secs(60)),
            refresh_limiter: RateLimiter::new(1, Duration::from_secs(60)),
            chat_limiter: RateLimiter::new(10, Duration::from_secs(60)),
            search_states: SearchStateStore::new(),
            destinations,
            preview_provider: Arc::new(SummaryPreviewProvider),
            telegram_bot_token,
            slack_bot_token,
            telegram_publisher,
            slack_publisher,
        })
    }
}
