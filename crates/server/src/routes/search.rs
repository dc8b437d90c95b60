//! GET /search — query the session index.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use session_watch_search::{SearchFilters, SortMode};

use crate::error::{ApiError, ApiResult};
use crate::routes::client_ip;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 10;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub project: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub filters: SearchFilters,
    pub sort: SortMode,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub results: Vec<session_watch_types::Session>,
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let key = format!("api:{}", client_ip(&headers, Some(peer)));
    let (allowed, retry_after_seconds) = state.search_limiter.check_with_retry(&key);
    if !allowed {
        return Err(ApiError::RateLimited { retry_after_secs: retry_after_seconds });
    }

    let q = query.q.as_deref().unwrap_or("");
    let mut params = session_watch_search::query::parse(q);
    if let Some(project) = query.project {
        params.filters.project = Some(project);
    }
    if let Some(since) = query.since.as_deref() {
        params.filters.since = session_watch_search::query::parse_iso_date(since);
    }
    if let Some(until) = query.until.as_deref() {
        params.filters.until = session_watch_search::query::parse_iso_date(until);
    }
    if let Some(sort) = &query.sort {
        if let Ok(mode) = sort.parse::<SortMode>() {
            params.filters.sort = Some(mode);
        }
    }
    params.limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    params.offset = query.offset.unwrap_or(0);

    let index = state.indexer.get_index().await?;
    let results = state.search_engine.search(&index, &params);
    let sort = params.filters.sort.unwrap_or_default();

    Ok(Json(SearchResponse {
        query: results.query,
        filters: params.filters,
        sort,
        total: results.total,
        offset: params.offset,
        limit: params.limit,
        results: results.sessions,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search_handler))
}
