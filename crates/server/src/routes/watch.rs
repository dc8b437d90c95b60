//! POST /search/watch — attach a chat destination to a session and request
//! a short replay of its recent events. Replay delivery itself is an
//! external collaborator's concern; this handler only validates the request,
//! records the attachment, and echoes back what was accepted.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use session_watch_types::DestinationKind;

use crate::destinations::DEFAULT_REPLAY_COUNT;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Mobile,
    Desktop,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchDestination {
    Telegram { chat_id: String },
    Slack { channel: String },
}

impl WatchDestination {
    fn kind(&self) -> DestinationKind {
        match self {
            WatchDestination::Telegram { .. } => DestinationKind::ChatA,
            WatchDestination::Slack { .. } => DestinationKind::ChatB,
        }
    }

    fn identifier(&self) -> &str {
        match self {
            WatchDestination::Telegram { chat_id } => chat_id,
            WatchDestination::Slack { channel } => channel,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WatchRequest {
    pub session_id: Option<String>,
    pub destination: Option<WatchDestination>,
    pub preset: Option<Preset>,
    pub replay_count: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    pub attached: bool,
    pub session_id: String,
    pub preset: Preset,
    pub session_summary: Option<String>,
}

async fn watch_handler(State(state): State<Arc<AppState>>, body: Option<Json<WatchRequest>>) -> ApiResult<(StatusCode, Json<WatchResponse>)> {
    let Some(Json(req)) = body else {
        return Err(ApiError::BadRequest("invalid JSON body".to_string()));
    };

    let session_id = req.session_id.ok_or_else(|| ApiError::BadRequest("session_id required".to_string()))?;
    let destination = req.destination.ok_or_else(|| ApiError::BadRequest("destination required".to_string()))?;
    let preset = req.preset.ok_or_else(|| ApiError::BadRequest("preset must be 'mobile' or 'desktop'".to_string()))?;
    let replay_count = req.replay_count.unwrap_or(DEFAULT_REPLAY_COUNT);

    let bot_token_configured = match destination.kind() {
        DestinationKind::ChatA => state.telegram_bot_token.is_some(),
        DestinationKind::ChatB => state.slack_bot_token.is_some(),
    };
    if !bot_token_configured {
        return Err(ApiError::DestinationNotConfigured);
    }

    let session = state.indexer.get_session(&session_id).await?;
    let attached = state
        .destinations
        .attach(&session_id, &session.file_path, destination.kind(), destination.identifier(), replay_count);

    Ok((
        StatusCode::CREATED,
        Json(WatchResponse {
            attached,
            session_id,
            preset,
            session_summary: session.summary,
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search/watch", post(watch_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_destination_maps_to_chat_a() {
        let dest = WatchDestination::Telegram { chat_id: "123".to_string() };
        assert_eq!(dest.kind(), DestinationKind::ChatA);
        assert_eq!(dest.identifier(), "123");
    }

    #[test]
    fn slack_destination_maps_to_chat_b() {
        let dest = WatchDestination::Slack { channel: "C1".to_string() };
        assert_eq!(dest.kind(), DestinationKind::ChatB);
        assert_eq!(dest.identifier(), "C1");
    }
}
