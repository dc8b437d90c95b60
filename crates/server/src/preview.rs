//! Short preview event list used by both the HTTP API and the chat command
//! handlers when someone asks to peek at a session without opening the full
//! transcript.
//!
//! Deliberately minimal: a full transcript parse is out of scope here, so
//! this pulls from the session's cached summary only.

use serde::Serialize;
use session_watch_types::Session;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEvent {
    pub label: String,
    pub detail: Option<String>,
}

pub trait PreviewProvider: Send + Sync {
    fn preview(&self, session: &Session) -> Vec<PreviewEvent>;
}

pub struct SummaryPreviewProvider;

impl PreviewProvider for SummaryPreviewProvider {
    fn preview(&self, session: &Session) -> Vec<PreviewEvent> {
        match &session.summary {
            Some(summary) => vec![PreviewEvent {
                label: "summary".to_string(),
                detail: Some(summary.clone()),
            }],
            None => vec![PreviewEvent {
                label: "summary".to_string(),
                detail: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session(summary: Option<&str>) -> Session {
        Session {
            session_id: "s1".to_string(),
            project_encoded: "-tmp".to_string(),
            project_display_name: "tmp".to_string(),
            file_path: PathBuf::from("/tmp/s1.jsonl"),
            summary: summary.map(str::to_string),
            created_at: chrono::Utc::now(),
            modified_at: chrono::Utc::now(),
            size_bytes: 0,
            line_count: 0,
            has_subagents: false,
        }
    }

    #[test]
    fn preview_surfaces_the_summary() {
        let events = SummaryPreviewProvider.preview(&session(Some("fixed the bug")));
        assert_eq!(events[0].detail.as_deref(), Some("fixed the bug"));
    }

    #[test]
    fn preview_has_no_detail_without_a_summary() {
        let events = SummaryPreviewProvider.preview(&session(None));
        assert!(events[0].detail.is_none());
    }
}
