//! Tracks which chat destinations are watching which session, persisted
//! through `session_watch_core::Config` so attachments survive a restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use session_watch_core::{Config, SessionConfigEntry};
use session_watch_types::{AttachedDestination, DestinationKind};

/// Default number of recent events replayed to a destination when it first
/// starts watching a session, per spec's `/search/watch` contract.
pub const DEFAULT_REPLAY_COUNT: u32 = 5;

/// Called exactly once per session, the moment its first destination is
/// attached — used to kick off whatever external bookkeeping a session
/// being watched for the first time requires, including requesting a short
/// replay of its most recent `replay_count` events.
pub trait SessionStartHook: Send + Sync {
    fn on_session_start(&self, session_id: &str, file_path: &Path, replay_count: u32);
}

/// A hook that does nothing — the default when no caller supplies one.
pub struct NoopSessionStartHook;

impl SessionStartHook for NoopSessionStartHook {
    fn on_session_start(&self, _session_id: &str, _file_path: &Path, _replay_count: u32) {}
}

pub fn make_telegram_identifier(chat_id: i64, message_thread_id: Option<i64>) -> String {
    match message_thread_id {
        Some(thread_id) => format!("{chat_id}:{thread_id}"),
        None => chat_id.to_string(),
    }
}

/// Reverse of [`make_telegram_identifier`]. Splits from the right so a
/// negative chat id (`-1001234567890`, common for supergroups) is never
/// mistaken for a second component.
pub fn parse_telegram_identifier(identifier: &str) -> Option<(i64, Option<i64>)> {
    match identifier.rsplit_once(':') {
        Some((chat_part, thread_part)) => {
            let chat_id: i64 = chat_part.parse().ok()?;
            let thread_id: i64 = thread_part.parse().ok()?;
            Some((chat_id, Some(thread_id)))
        }
        None => identifier.parse().ok().map(|chat_id| (chat_id, None)),
    }
}

struct SessionAttachments {
    file_path: std::path::PathBuf,
    destinations: Vec<AttachedDestination>,
}

pub struct DestinationManager {
    config_path: std::path::PathBuf,
    state: Mutex<HashMap<String, SessionAttachments>>,
    hook: Arc<dyn SessionStartHook>,
}

impl DestinationManager {
    pub fn new(config_path: impl Into<std::path::PathBuf>, hook: Arc<dyn SessionStartHook>) -> Self {
        Self {
            config_path: config_path.into(),
            state: Mutex::new(HashMap::new()),
            hook,
        }
    }

    /// Attach a destination, requesting a replay of its last `replay_count`
    /// events if this is the session's first ever destination. Idempotent:
    /// attaching the same `(kind, identifier)` twice to the same session is
    /// a no-op. Returns whether this call actually added a new destination.
    pub fn attach(&self, session_id: &str, file_path: &Path, kind: DestinationKind, identifier: &str, replay_count: u32) -> bool {
        let mut state = self.state.lock().unwrap();
        let entry = state.entry(session_id.to_string()).or_insert_with(|| SessionAttachments {
            file_path: file_path.to_path_buf(),
            destinations: Vec::new(),
        });
        let is_first_ever = entry.destinations.is_empty();
        entry.file_path = file_path.to_path_buf();

        if entry.destinations.iter().any(|d| d.kind == kind && d.identifier == identifier) {
            return false;
        }

        entry.destinations.push(AttachedDestination {
            kind,
            identifier: identifier.to_string(),
            attached_at: Utc::now(),
        });
        self.persist(&state);
        drop(state);

        if is_first_ever {
            self.hook.on_session_start(session_id, file_path, replay_count);
        }
        true
    }

    pub fn detach(&self, session_id: &str, kind: DestinationKind, identifier: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.get_mut(session_id) else {
            return false;
        };
        let before = entry.destinations.len();
        entry.destinations.retain(|d| !(d.kind == kind && d.identifier == identifier));
        let removed = entry.destinations.len() != before;
        if entry.destinations.is_empty() {
            state.remove(session_id);
        }
        if removed {
            self.persist(&state);
        }
        removed
    }

    pub fn get_destinations(&self, session_id: &str) -> Vec<AttachedDestination> {
        self.state
            .lock()
            .unwrap()
            .get(session_id)
            .map(|entry| entry.destinations.clone())
            .unwrap_or_default()
    }

    pub fn get_destinations_by_type(&self, session_id: &str, kind: DestinationKind) -> Vec<String> {
        self.get_destinations(session_id)
            .into_iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.identifier)
            .collect()
    }

    pub fn has_destinations(&self, session_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .get(session_id)
            .is_some_and(|entry| !entry.destinations.is_empty())
    }

    /// Rebuild in-memory state from the on-disk config and re-invoke
    /// `on_session_start` for every session that has at least one
    /// destination — called once at startup, per spec's
    /// `restore_from_config` contract, so tailing resumes for sessions that
    /// were already being watched before the process restarted.
    pub fn restore_from_config(&self, config: &Config) {
        let mut state = self.state.lock().unwrap();
        state.clear();
        let mut to_notify = Vec::new();
        for (session_id, entry) in &config.sessions {
            let mut destinations = Vec::new();
            for identifier in &entry.chat_a {
                destinations.push(AttachedDestination {
                    kind: DestinationKind::ChatA,
                    identifier: identifier.clone(),
                    attached_at: Utc::now(),
                });
            }
            for identifier in &entry.chat_b {
                destinations.push(AttachedDestination {
                    kind: DestinationKind::ChatB,
                    identifier: identifier.clone(),
                    attached_at: Utc::now(),
                });
            }
            if !destinations.is_empty() {
                let file_path = std::path::PathBuf::from(&entry.path);
                to_notify.push((session_id.clone(), file_path.clone()));
                state.insert(session_id.clone(), SessionAttachments { file_path, destinations });
            }
        }
        drop(state);

        for (session_id, file_path) in to_notify {
            self.hook.on_session_start(&session_id, &file_path, DEFAULT_REPLAY_COUNT);
        }
    }

    fn persist(&self, state: &HashMap<String, SessionAttachments>) {
        let mut config = Config::default();
        for (session_id, entry) in state {
            let mut config_entry = SessionConfigEntry {
                path: entry.file_path.to_string_lossy().to_string(),
                ..Default::default()
            };
            for d in &entry.destinations {
                match d.kind {
                    DestinationKind::ChatA => config_entry.chat_a.push(d.identifier.clone()),
                    DestinationKind::ChatB => config_entry.chat_b.push(d.identifier.clone()),
                }
            }
            if !config_entry.is_empty() {
                config.sessions.insert(session_id.clone(), config_entry);
            }
        }
        if let Err(err) = config.save(&self.config_path) {
            tracing::warn!(error = %err, "failed to persist destinations config");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingHook(AtomicUsize);

    impl SessionStartHook for CountingHook {
        fn on_session_start(&self, _session_id: &str, _file_path: &Path, _replay_count: u32) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RecordingHook(Mutex<Option<u32>>);

    impl SessionStartHook for RecordingHook {
        fn on_session_start(&self, _session_id: &str, _file_path: &Path, replay_count: u32) {
            *self.0.lock().unwrap() = Some(replay_count);
        }
    }

    #[test]
    fn attach_forwards_the_requested_replay_count_to_the_hook() {
        let dir = tempdir().unwrap();
        let hook = Arc::new(RecordingHook(Mutex::new(None)));
        let manager = DestinationManager::new(dir.path().join("destinations.yaml"), hook.clone());

        manager.attach("s1", Path::new("/tmp/s1.jsonl"), DestinationKind::ChatA, "chan-1", 12);
        assert_eq!(*hook.0.lock().unwrap(), Some(12));
    }

    #[test]
    fn telegram_identifier_round_trips_with_negative_chat_id() {
        let identifier = make_telegram_identifier(-1001234567890, Some(42));
        assert_eq!(identifier, "-1001234567890:42");
        assert_eq!(parse_telegram_identifier(&identifier), Some((-1001234567890, Some(42))));
    }

    #[test]
    fn telegram_identifier_round_trips_without_thread() {
        let identifier = make_telegram_identifier(555, None);
        assert_eq!(parse_telegram_identifier(&identifier), Some((555, None)));
    }

    #[test]
    fn attach_is_idempotent() {
        let dir = tempdir().unwrap();
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let manager = DestinationManager::new(dir.path().join("destinations.yaml"), hook.clone());

        assert!(manager.attach("s1", Path::new("/tmp/s1.jsonl"), DestinationKind::ChatA, "chan-1", DEFAULT_REPLAY_COUNT));
        assert!(!manager.attach("s1", Path::new("/tmp/s1.jsonl"), DestinationKind::ChatA, "chan-1", DEFAULT_REPLAY_COUNT));
        assert_eq!(manager.get_destinations("s1").len(), 1);
    }

    #[test]
    fn on_session_start_fires_exactly_once_per_session() {
        let dir = tempdir().unwrap();
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let manager = DestinationManager::new(dir.path().join("destinations.yaml"), hook.clone());

        manager.attach("s1", Path::new("/tmp/s1.jsonl"), DestinationKind::ChatA, "chan-1", DEFAULT_REPLAY_COUNT);
        manager.attach("s1", Path::new("/tmp/s1.jsonl"), DestinationKind::ChatB, "chan-2", DEFAULT_REPLAY_COUNT);
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_removes_destination_and_persists() {
        let dir = tempdir().unwrap();
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let manager = DestinationManager::new(dir.path().join("destinations.yaml"), hook);

        manager.attach("s1", Path::new("/tmp/s1.jsonl"), DestinationKind::ChatA, "chan-1", DEFAULT_REPLAY_COUNT);
        assert!(manager.detach("s1", DestinationKind::ChatA, "chan-1"));
        assert!(!manager.has_destinations("s1"));
    }

    #[test]
    fn restore_from_config_repopulates_state_and_refires_hook() {
        let dir = tempdir().unwrap();
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let manager = DestinationManager::new(dir.path().join("destinations.yaml"), hook.clone());

        let mut config = Config::default();
        config.sessions.insert(
            "s1".to_string(),
            SessionConfigEntry {
                path: "/tmp/s1.jsonl".to_string(),
                chat_a: vec!["chan-1".to_string()],
                chat_b: vec![],
            },
        );
        manager.restore_from_config(&config);

        assert!(manager.has_destinations("s1"));
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn restore_from_config_skips_sessions_with_no_destinations() {
        let dir = tempdir().unwrap();
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let manager = DestinationManager::new(dir.path().join("destinations.yaml"), hook.clone());

        let mut config = Config::default();
        config.sessions.insert(
            "s1".to_string(),
            SessionConfigEntry {
                path: "/tmp/s1.jsonl".to_string(),
                chat_a: vec![],
                chat_b: vec![],
            },
        );
        manager.restore_from_config(&config);

        assert!(!manager.has_destinations("s1"));
        assert_eq!(hook.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn attach_persists_the_session_path_for_later_restore() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("destinations.yaml");
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let manager = DestinationManager::new(config_path.clone(), hook);

        manager.attach("s1", Path::new("/home/alice/.claude/projects/-tmp/s1.jsonl"), DestinationKind::ChatA, "chan-1", DEFAULT_REPLAY_COUNT);

        let loaded = Config::load(&config_path).unwrap();
        let entry = loaded.sessions.get("s1").unwrap();
        assert_eq!(entry.path, "/home/alice/.claude/projects/-tmp/s1.jsonl");
    }
}
