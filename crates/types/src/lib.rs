//! Shared data model for the session index.
//!
//! These types are the wire format for the persisted index
//! (`search_index.json`, see the server crate's indexer) and the common
//! currency passed between the core, search, and server crates.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Indexed information about a single session log file.
///
/// `duration_ms` is intentionally absent from this struct — it is expensive
/// to compute (a full file scan) and is derived on demand by
/// `session_watch_core::metadata::duration_ms`, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub project_encoded: String,
    pub project_display_name: String,
    pub file_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub line_count: u64,
    pub has_subagents: bool,
}

/// Derived, per-project rollup rebuilt on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub encoded_name: String,
    pub decoded_path: String,
    pub display_name: String,
    pub session_ids: Vec<String>,
    pub total_size_bytes: u64,
    pub latest_modified_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(encoded_name: String, decoded_path: String, display_name: String) -> Self {
        Self {
            encoded_name,
            decoded_path,
            display_name,
            session_ids: Vec::new(),
            total_size_bytes: 0,
            latest_modified_at: None,
        }
    }
}

/// The root index: every known session and project, plus bookkeeping for
/// incremental refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIndex {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub last_refresh: DateTime<Utc>,
    pub refresh_duration_ms: u64,
    pub sessions: HashMap<String, Session>,
    pub projects: HashMap<String, Project>,
    /// Absolute file path -> mtime (seconds since epoch, fractional).
    pub file_mtimes: HashMap<String, f64>,
}

/// Current on-disk schema version for `search_index.json`.
pub const SESSION_INDEX_VERSION: u32 = 1;

impl SessionIndex {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: SESSION_INDEX_VERSION,
            created_at: now,
            last_refresh: now,
            refresh_duration_ms: 0,
            sessions: HashMap::new(),
            projects: HashMap::new(),
            file_mtimes: HashMap::new(),
        }
    }
}

/// Which chat surface a destination belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationKind {
    ChatA,
    ChatB,
}

impl DestinationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DestinationKind::ChatA => "chat-a",
            DestinationKind::ChatB => "chat-b",
        }
    }
}

/// A live chat destination attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedDestination {
    pub kind: DestinationKind,
    pub identifier: String,
    pub attached_at: DateTime<Utc>,
}
