//! GET /projects — list all known projects.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use session_watch_types::Project;

use crate::error::{ApiError, ApiResult};
use crate::routes::client_ip;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ProjectsQuery {
    pub since: Option<String>,
    pub until: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectsResponse {
    pub projects: Vec<Project>,
    pub total_projects: usize,
    pub total_sessions: usize,
    pub index_age_seconds: i64,
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ProjectsQuery>,
) -> ApiResult<Json<ProjectsResponse>> {
    let key = format!("api:{}", client_ip(&headers, Some(peer)));
    let (allowed, retry_after_seconds) = state.search_limiter.check_with_retry(&key);
    if !allowed {
        return Err(ApiError::RateLimited { retry_after_secs: retry_after_seconds });
    }

    let since = query.since.as_deref().and_then(session_watch_search::query::parse_iso_date);
    let until = query.until.as_deref().and_then(session_watch_search::query::parse_iso_date);

    let index = state.indexer.get_index().await?;
    let total_sessions = index.sessions.len();
    let index_age_seconds = (chrono::Utc::now() - index.last_refresh).num_seconds().max(0);

    let mut projects: Vec<Project> = index
        .projects
        .into_values()
        .filter(|p| since.map(|s| p.latest_modified_at.is_some_and(|m| m >= s)).unwrap_or(true))
        .filter(|p| until.map(|u| p.latest_modified_at.is_some_and(|m| m <= u)).unwrap_or(true))
        .collect();
    projects.sort_by(|a, b| b.latest_modified_at.cmp(&a.latest_modified_at));

    Ok(Json(ProjectsResponse {
        total_projects: projects.len(),
        total_sessions,
        projects,
        index_age_seconds,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/projects", get(list_projects))
}
