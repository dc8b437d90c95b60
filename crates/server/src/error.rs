use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use session_watch_core::IndexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("search is not configured on this server")]
    NotInitialised,

    #[error("bot token for this destination is not configured")]
    DestinationNotConfigured,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// The stable, machine-readable error code each variant maps to — this is
/// the literal `error` field value in the JSON body, not `Display`'s
/// human-readable message.
fn error_code(err: &ApiError) -> &'static str {
    match err {
        ApiError::SessionNotFound(_) | ApiError::Index(IndexError::SessionNotFound { .. }) => "session_not_found",
        ApiError::ProjectNotFound(_) | ApiError::Index(IndexError::ProjectNotFound { .. }) => "project_not_found",
        ApiError::RateLimited { .. } | ApiError::Index(IndexError::RateLimited { .. }) => "rate_limited",
        ApiError::NotInitialised => "not_initialised",
        ApiError::DestinationNotConfigured => "destination_not_configured",
        ApiError::BadRequest(_) => "validation_error",
        ApiError::Index(_) => "internal_error",
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound(_) | ApiError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotInitialised => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DestinationNotConfigured => StatusCode::BAD_REQUEST,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Index(IndexError::SessionNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Index(IndexError::ProjectNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Index(IndexError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let retry_after_seconds = match &self {
            ApiError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            ApiError::Index(IndexError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorResponse {
            error: error_code(&self).to_string(),
            retry_after_seconds,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_maps_to_404_with_a_stable_code() {
        let err = ApiError::SessionNotFound("abc".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = ApiError::RateLimited { retry_after_secs: 10 };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn index_rate_limited_propagates_retry_after() {
        let err = ApiError::from(IndexError::RateLimited { retry_after_secs: 5 });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn not_initialised_maps_to_503() {
        let err = ApiError::NotInitialised;
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn error_code_is_a_stable_machine_readable_string() {
        assert_eq!(error_code(&ApiError::SessionNotFound("x".into())), "session_not_found");
        assert_eq!(error_code(&ApiError::RateLimited { retry_after_secs: 1 }), "rate_limited");
    }
}
