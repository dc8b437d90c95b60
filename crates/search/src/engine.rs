//! Filters, scores, sorts, and paginates a [`SessionIndex`] against a
//! [`SearchParams`].

use chrono::Utc;
use session_watch_types::{Session, SessionIndex};

use crate::types::{SearchFilters, SearchParams, SearchResults, SortMode};

/// Terms shorter than this are considered too common to narrow a search and
/// are dropped from the AND filter entirely — a lone `-a` in the query text
/// would otherwise match almost every summary.
const MIN_TERM_LEN: usize = 2;

pub struct SearchEngine;

impl SearchEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn search(&self, index: &SessionIndex, params: &SearchParams) -> SearchResults {
        let mut sessions: Vec<&Session> = index.sessions.values().collect();

        apply_filters(&mut sessions, &params.filters);
        apply_terms(&mut sessions, &params.terms);

        let total = sessions.len();

        sort_sessions(&mut sessions, params.filters.sort.unwrap_or_default(), &params.terms);

        let query = params.terms.join(" ");
        let paginated = sessions
            .into_iter()
            .skip(params.offset)
            .take(if params.limit == 0 { total } else { params.limit })
            .cloned()
            .collect();

        SearchResults {
            sessions: paginated,
            total,
            query,
        }
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_filters(sessions: &mut Vec<&Session>, filters: &SearchFilters) {
    if let Some(project) = &filters.project {
        let needle = project.to_lowercase();
        sessions.retain(|s| s.project_display_name.to_lowercase().contains(&needle));
    }

    if let Some(last) = &filters.last {
        if let Some(duration) = crate::query::parse_time_range(last) {
            let cutoff = Utc::now() - duration;
            sessions.retain(|s| s.modified_at >= cutoff);
        }
    }

    if let Some(since) = filters.since {
        sessions.retain(|s| s.modified_at >= since);
    }

    if let Some(until) = filters.until {
        sessions.retain(|s| s.modified_at <= until);
    }
}

fn apply_terms(sessions: &mut Vec<&Session>, terms: &[String]) {
    let significant: Vec<&String> = terms.iter().filter(|t| t.chars().count() >= MIN_TERM_LEN).collect();
    if significant.is_empty() {
        return;
    }
    sessions.retain(|s| significant.iter().any(|term| matches_any_field(s, term)));
}

fn matches_any_field(session: &Session, term: &str) -> bool {
    let needle = term.to_lowercase();
    session
        .summary
        .as_deref()
        .map(|s| s.to_lowercase().contains(&needle))
        .unwrap_or(false)
        || session.project_display_name.to_lowercase().contains(&needle)
        || session.session_id.eq_ignore_ascii_case(term)
}

/// Relevance score for a session against a set of terms: +2.0 per term
/// found in the summary, +1.0 if the full phrase (terms joined with a
/// space) appears in the summary, +1.0 per term found in the project name,
/// plus a recency boost that decays to zero after 30 days.
pub fn calculate_score(session: &Session, terms: &[String]) -> f64 {
    let mut score = 0.0;

    let summary = session.summary.as_deref().unwrap_or("").to_lowercase();
    let project = session.project_display_name.to_lowercase();

    for term in terms {
        let needle = term.to_lowercase();
        if !needle.is_empty() && summary.contains(&needle) {
            score += 2.0;
        }
        if !needle.is_empty() && project.contains(&needle) {
            score += 1.0;
        }
    }

    let phrase = terms.join(" ").to_lowercase();
    if !phrase.is_empty() && summary.contains(&phrase) {
        score += 1.0;
    }

    let days_since_modified = (Utc::now() - session.modified_at).num_seconds() as f64 / 86_400.0;
    score += (1.0 - days_since_modified / 30.0).max(0.0);

    score
}

fn sort_sessions(sessions: &mut [&Session], mode: SortMode, terms: &[String]) {
    match mode {
        SortMode::Recent => sessions.sort_by(|a, b| {
            let score_a = calculate_score(a, terms);
            let score_b = calculate_score(b, terms);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.modified_at.cmp(&a.modified_at))
        }),
        SortMode::Oldest => sessions.sort_by(|a, b| a.modified_at.cmp(&b.modified_at)),
        SortMode::Size => sessions.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
        SortMode::Duration => sessions.sort_by(|a, b| {
            let da = session_watch_core::metadata::duration_ms(&a.file_path).ok().flatten();
            let db = session_watch_core::metadata::duration_ms(&b.file_path).ok().flatten();
            match (da, db) {
                (Some(da), Some(db)) => db.cmp(&da),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;

    fn session(id: &str, summary: &str, project: &str, size: u64, modified_days_ago: i64) -> Session {
        Session {
            session_id: id.to_string(),
            project_encoded: format!("-{project}"),
            project_display_name: project.to_string(),
            file_path: std::path::PathBuf::from(format!("/tmp/{id}.jsonl")),
            summary: Some(summary.to_string()),
            created_at: Utc::now() - Duration::days(modified_days_ago),
            modified_at: Utc::now() - Duration::days(modified_days_ago),
            size_bytes: size,
            line_count: 1,
            has_subagents: false,
        }
    }

    fn index_of(sessions: Vec<Session>) -> SessionIndex {
        let mut idx = SessionIndex::empty(Utc::now());
        for s in sessions {
            idx.sessions.insert(s.session_id.clone(), s);
        }
        idx
    }

    #[test]
    fn search_filters_by_term_across_summary() {
        let index = index_of(vec![
            session("a", "fix the login bug", "trello", 100, 1),
            session("b", "unrelated work", "trello", 100, 1),
        ]);
        let params = SearchParams {
            terms: vec!["login".to_string()],
            filters: SearchFilters::default(),
            limit: 10,
            offset: 0,
        };
        let results = SearchEngine::new().search(&index, &params);
        assert_eq!(results.sessions.len(), 1);
        assert_eq!(results.sessions[0].session_id, "a");
    }

    #[test]
    fn multiple_terms_match_on_any_not_all() {
        let index = index_of(vec![
            session("a", "fix the login bug", "trello", 100, 1),
            session("b", "refactor the payments module", "trello", 100, 1),
            session("c", "unrelated notes", "trello", 100, 1),
        ]);
        let params = SearchParams {
            terms: vec!["login".to_string(), "payments".to_string()],
            filters: SearchFilters::default(),
            limit: 10,
            offset: 0,
        };
        let results = SearchEngine::new().search(&index, &params);
        let ids: Vec<&str> = results.sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"b"));
    }

    #[test]
    fn single_char_terms_do_not_narrow_results() {
        let index = index_of(vec![
            session("a", "fix the login bug", "trello", 100, 1),
            session("b", "unrelated work", "trello", 100, 1),
        ]);
        let params = SearchParams {
            terms: vec!["x".to_string()],
            filters: SearchFilters::default(),
            limit: 10,
            offset: 0,
        };
        let results = SearchEngine::new().search(&index, &params);
        assert_eq!(results.sessions.len(), 2);
    }

    #[test]
    fn project_filter_matches_case_insensitively() {
        let index = index_of(vec![
            session("a", "notes", "Trello", 100, 1),
            session("b", "notes", "Jira", 100, 1),
        ]);
        let params = SearchParams {
            terms: vec![],
            filters: SearchFilters {
                project: Some("trello".to_string()),
                ..Default::default()
            },
            limit: 10,
            offset: 0,
        };
        let results = SearchEngine::new().search(&index, &params);
        assert_eq!(results.sessions.len(), 1);
        assert_eq!(results.sessions[0].session_id, "a");
    }

    #[test]
    fn limit_and_offset_paginate_without_changing_total() {
        let index = index_of(vec![
            session("a", "notes", "trello", 100, 1),
            session("b", "notes", "trello", 100, 2),
            session("c", "notes", "trello", 100, 3),
        ]);
        let params = SearchParams {
            terms: vec![],
            filters: SearchFilters::default(),
            limit: 1,
            offset: 1,
        };
        let results = SearchEngine::new().search(&index, &params);
        assert_eq!(results.sessions.len(), 1);
        assert_eq!(results.total, 3);
    }

    #[test]
    fn sort_by_size_orders_descending() {
        let index = index_of(vec![
            session("a", "notes", "trello", 50, 1),
            session("b", "notes", "trello", 500, 1),
        ]);
        let params = SearchParams {
            terms: vec![],
            filters: SearchFilters {
                sort: Some(SortMode::Size),
                ..Default::default()
            },
            limit: 10,
            offset: 0,
        };
        let results = SearchEngine::new().search(&index, &params);
        assert_eq!(results.sessions[0].session_id, "b");
        assert_eq!(results.sessions[1].session_id, "a");
    }

    #[test]
    fn recent_sort_ranks_by_score_before_recency() {
        // "fix auth bug" scores higher on term "auth" than a merely-recent,
        // summary-less session with no term match at all.
        let index = index_of(vec![
            session("a", "fix auth bug", "trello", 100, 10),
            session("b", "totally unrelated notes", "trello", 100, 1),
        ]);
        let params = SearchParams {
            terms: vec!["auth".to_string()],
            filters: SearchFilters::default(),
            limit: 10,
            offset: 0,
        };
        let results = SearchEngine::new().search(&index, &params);
        assert_eq!(results.sessions.len(), 1);
        assert_eq!(results.sessions[0].session_id, "a");
    }

    #[test]
    fn recent_sort_breaks_score_ties_by_modified_at() {
        let index = index_of(vec![
            session("older", "fix auth bug", "trello", 100, 10),
            session("newer", "fix auth bug", "trello", 100, 1),
        ]);
        let params = SearchParams {
            terms: vec!["auth".to_string()],
            filters: SearchFilters::default(),
            limit: 10,
            offset: 0,
        };
        let results = SearchEngine::new().search(&index, &params);
        assert_eq!(results.sessions[0].session_id, "newer");
        assert_eq!(results.sessions[1].session_id, "older");
    }

    #[test]
    fn calculate_score_rewards_summary_and_project_matches() {
        let s = session("a", "fix the login bug", "login-service", 100, 1);
        let score = calculate_score(&s, &["login".to_string()]);
        assert!(score > 2.0);
    }

    #[test]
    fn calculate_score_decays_with_age() {
        let recent = session("a", "fix bug", "trello", 100, 1);
        let old = session("b", "fix bug", "trello", 100, 60);
        let terms = vec!["fix".to_string()];
        assert!(calculate_score(&recent, &terms) > calculate_score(&old, &terms));
    }
}
