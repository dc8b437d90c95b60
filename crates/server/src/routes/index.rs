//! POST /index/refresh — trigger an index refresh in the background.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const REFRESH_KEY: &str = "global:refresh";

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: String,
    pub message: String,
}

async fn refresh_handler(State(state): State<Arc<AppState>>) -> ApiResult<(StatusCode, Json<RefreshResponse>)> {
    let (allowed, retry_after_seconds) = state.refresh_limiter.check_with_retry(REFRESH_KEY);
    if !allowed {
        return Err(ApiError::RateLimited { retry_after_secs: retry_after_seconds });
    }

    let indexer = state.indexer.clone();
    tokio::spawn(async move {
        if let Err(err) = indexer.refresh(true).await {
            tracing::warn!(error = %err, "index refresh requested via API failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            status: "started".to_string(),
            message: "index refresh started in the background".to_string(),
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/index/refresh", post(refresh_handler))
}
