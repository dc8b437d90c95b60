//! API route handlers for the session-watch server.

pub mod health;
pub mod index;
pub mod projects;
pub mod search;
pub mod sessions;
pub mod slack_webhook;
pub mod telegram_webhook;
pub mod watch;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The combined API router, nested under `/api`, with request tracing.
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", search::router())
        .nest("/api", projects::router())
        .nest("/api", sessions::router())
        .nest("/api", index::router())
        .nest("/api", watch::router())
        .merge(telegram_webhook::router())
        .merge(slack_webhook::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The rate-limit key's IP component: the first hop of `X-Forwarded-For` if
/// present, else the transport peer, else `"unknown"` (in which case every
/// such caller shares one bucket — acceptable per the rate-limit contract).
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}
