//! Integration tests driving the real `api_routes` router end to end,
//! the same way the search/projects/preview handlers are actually invoked
//! in production (request in, `tower::Service` dispatch, response out).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use session_watch_core::{Indexer, IndexerConfig};
use session_watch_server::destinations::{DestinationManager, NoopSessionStartHook};
use session_watch_server::routes::api_routes;
use session_watch_server::state::AppState;
use tower::ServiceExt;

/// Builds the router against an empty, never-persisted index rooted at a
/// fresh temp directory, wrapped so `ConnectInfo<SocketAddr>` extraction
/// works the same as it does under `into_make_service_with_connect_info`.
async fn test_app() -> (Router, tempfile::TempDir) {
    let projects_dir = tempfile::tempdir().unwrap();
    let state_dir = tempfile::tempdir().unwrap();

    let indexer = Arc::new(Indexer::with_roots(
        vec![projects_dir.path().to_path_buf()],
        state_dir.path().to_path_buf(),
        IndexerConfig::default(),
    ));
    indexer.refresh(true).await.unwrap();

    let destinations_path = state_dir.path().join("destinations.yaml");
    let destinations = Arc::new(DestinationManager::new(destinations_path, Arc::new(NoopSessionStartHook)));
    let state = AppState::new(indexer, destinations, None, None);

    let app = api_routes(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 1234))));
    (app, projects_dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn search_on_an_empty_index_returns_no_results() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/search?q=hello").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 0);
    assert_eq!(json["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn search_clamps_limit_to_the_endpoint_max() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/search?limit=9999").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["limit"], 10);
}

#[tokio::test]
async fn projects_on_an_empty_index_is_an_empty_list() {
    let (app, _dir) = test_app().await;
    let response = app.oneshot(Request::builder().uri("/api/projects").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total_projects"], 0);
    assert_eq!(json["total_sessions"], 0);
}

#[tokio::test]
async fn preview_for_an_unknown_session_is_404_with_a_stable_error_code() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/sessions/does-not-exist/preview").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "session_not_found");
}

#[tokio::test]
async fn index_refresh_is_accepted_and_runs_in_the_background() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().method("POST").uri("/api/index/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "started");
}

#[tokio::test]
async fn index_refresh_rate_limits_a_second_call_within_the_window() {
    let (app, _dir) = test_app().await;
    let request = || Request::builder().method("POST").uri("/api/index/refresh").body(Body::empty()).unwrap();

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn watch_without_a_configured_bot_token_is_rejected() {
    let (app, _dir) = test_app().await;
    let payload = serde_json::json!({
        "session_id": "whatever",
        "destination": {"type": "telegram", "chat_id": "123"},
        "preset": "mobile",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/search/watch")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "destination_not_configured");
}

#[tokio::test]
async fn watch_with_a_missing_session_id_is_a_validation_error() {
    let (app, _dir) = test_app().await;
    let payload = serde_json::json!({
        "destination": {"type": "telegram", "chat_id": "123"},
        "preset": "mobile",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/search/watch")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
}
