use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use session_watch_types::Session;

/// Structured filters extracted from a query string's option flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub project: Option<String>,
    pub last: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub sort: Option<SortMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    Recent,
    Oldest,
    Size,
    Duration,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::Recent
    }
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(SortMode::Recent),
            "oldest" => Ok(SortMode::Oldest),
            "size" => Ok(SortMode::Size),
            "duration" => Ok(SortMode::Duration),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// A fully parsed search request: free-text terms plus structured filters
/// and pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub terms: Vec<String>,
    pub filters: SearchFilters,
    pub limit: usize,
    pub offset: usize,
}

/// The result of running a [`SearchParams`] against the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub sessions: Vec<Session>,
    pub total: usize,
    pub query: String,
}
