//! Per-chat pagination state for search results paged through inline
//! keyboards / Block Kit buttons, with a TTL so abandoned sessions don't
//! accumulate forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use session_watch_types::Session;

#[derive(Debug, Clone)]
pub struct SearchState {
    pub query: String,
    pub sessions: Vec<Session>,
    pub offset: usize,
    pub page_size: usize,
}

impl SearchState {
    pub fn new(query: String, sessions: Vec<Session>, page_size: usize) -> Self {
        Self {
            query,
            sessions,
            offset: 0,
            page_size,
        }
    }

    pub fn get_page(&self) -> &[Session] {
        let end = (self.offset + self.page_size).min(self.sessions.len());
        if self.offset >= self.sessions.len() {
            &[]
        } else {
            &self.sessions[self.offset..end]
        }
    }

    pub fn session_at_index(&self, index: usize) -> Option<&Session> {
        self.sessions.get(self.offset + index)
    }

    pub fn has_next_page(&self) -> bool {
        self.offset + self.page_size < self.sessions.len()
    }

    pub fn has_prev_page(&self) -> bool {
        self.offset > 0
    }
}

const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct SearchStateStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, (SearchState, Instant)>>,
}

impl SearchStateStore {
    pub fn new() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn save(&self, key: &str, state: SearchState) {
        let ttl = self.ttl;
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, (_, saved_at)| saved_at.elapsed() <= ttl);
        entries.insert(key.to_string(), (state, Instant::now()));
    }

    pub fn get(&self, key: &str) -> Option<SearchState> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((_, saved_at)) if saved_at.elapsed() > self.ttl => {
                entries.remove(key);
                None
            }
            Some((state, _)) => Some(state.clone()),
            None => None,
        }
    }

    pub fn update_offset(&self, key: &str, offset: usize) {
        let mut entries = self.entries.lock().unwrap();
        if let Some((state, saved_at)) = entries.get_mut(key) {
            if saved_at.elapsed() <= self.ttl {
                state.offset = offset;
            }
        }
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    /// Drop every entry whose TTL has elapsed. Exposed for a caller (e.g. a
    /// periodic background task) to run opportunistically; `get`/`save`
    /// already evict lazily on the hot path, so this only matters for chat
    /// keys that are saved once and never revisited.
    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .lock()
            .unwrap()
            .retain(|_, (_, saved_at)| saved_at.elapsed() <= ttl);
    }
}

impl Default for SearchStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_watch_types::Session;

    fn dummy_session(id: &str) -> Session {
        Session {
            session_id: id.to_string(),
            project_encoded: "-tmp".to_string(),
            project_display_name: "tmp".to_string(),
            file_path: std::path::PathBuf::from(format!("/tmp/{id}.jsonl")),
            summary: None,
            created_at: chrono::Utc::now(),
            modified_at: chrono::Utc::now(),
            size_bytes: 0,
            line_count: 0,
            has_subagents: false,
        }
    }

    #[test]
    fn get_page_returns_a_slice_of_page_size() {
        let sessions = (0..5).map(|i| dummy_session(&i.to_string())).collect();
        let state = SearchState::new("q".to_string(), sessions, 2);
        assert_eq!(state.get_page().len(), 2);
        assert_eq!(state.get_page()[0].session_id, "0");
    }

    #[test]
    fn has_next_and_prev_page_reflect_offset() {
        let sessions = (0..5).map(|i| dummy_session(&i.to_string())).collect();
        let mut state = SearchState::new("q".to_string(), sessions, 2);
        assert!(state.has_next_page());
        assert!(!state.has_prev_page());
        state.offset = 4;
        assert!(!state.has_next_page());
        assert!(state.has_prev_page());
    }

    #[test]
    fn store_evicts_entries_past_ttl() {
        let store = SearchStateStore::with_ttl(Duration::from_millis(10));
        store.save("chat-1", SearchState::new("q".to_string(), vec![], 5));
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.get("chat-1").is_none());
    }

    #[test]
    fn update_offset_persists_across_get_calls() {
        let store = SearchStateStore::new();
        store.save("chat-1", SearchState::new("q".to_string(), vec![dummy_session("0")], 5));
        store.update_offset("chat-1", 1);
        assert_eq!(store.get("chat-1").unwrap().offset, 1);
    }

    #[test]
    fn cleanup_expired_removes_stale_entries_only() {
        let store = SearchStateStore::with_ttl(Duration::from_millis(10));
        store.save("chat-1", SearchState::new("q".to_string(), vec![], 5));
        std::thread::sleep(Duration::from_millis(20));
        store.save("chat-2", SearchState::new("q".to_string(), vec![], 5));
        store.cleanup_expired();
        assert_eq!(store.entries.lock().unwrap().len(), 1);
        assert!(store.entries.lock().unwrap().contains_key("chat-2"));
    }
}
