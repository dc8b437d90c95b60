//! GET /sessions/{id}/preview — a short event list for one session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::preview::PreviewEvent;
use crate::routes::client_ip;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 20;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PreviewQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub session_id: String,
    pub project_name: String,
    pub summary: Option<String>,
    pub total_events: u64,
    pub preview_events: Vec<PreviewEvent>,
    pub duration_ms: Option<i64>,
}

async fn preview_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<Json<PreviewResponse>> {
    let key = format!("api:{}", client_ip(&headers, Some(peer)));
    let (allowed, retry_after_seconds) = state.preview_limiter.check_with_retry(&key);
    if !allowed {
        return Err(ApiError::RateLimited { retry_after_secs: retry_after_seconds });
    }

    let session = state.indexer.get_session(&session_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let mut preview_events = state.preview_provider.preview(&session);
    preview_events.truncate(limit);
    let duration_ms = session_watch_core::metadata::duration_ms(&session.file_path).ok().flatten();

    Ok(Json(PreviewResponse {
        session_id: session.session_id,
        project_name: session.project_display_name,
        summary: session.summary,
        total_events: session.line_count,
        preview_events,
        duration_ms,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sessions/{session_id}/preview", get(preview_handler))
}
