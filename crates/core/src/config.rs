//! Persisted destinations configuration: which chat identifiers are
//! attached to which session, surviving process restarts.
//!
//! Stored as YAML at `<state_dir>/destinations.yaml`, written atomically
//! (temp file + rename) the same way the session index is.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Destinations attached to a single session, grouped by chat surface.
///
/// `path` is the session file's absolute path at the time it was first
/// attached — persisted so `restore_from_config` can re-invoke
/// `on_session_start` after a restart without re-reading the index first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfigEntry {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub chat_a: Vec<String>,
    #[serde(default)]
    pub chat_b: Vec<String>,
}

impl SessionConfigEntry {
    pub fn is_empty(&self) -> bool {
        self.chat_a.is_empty() && self.chat_b.is_empty()
    }
}

/// The destinations config file: one entry per session that has at least
/// one attached chat destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sessions: HashMap<String, SessionConfigEntry>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(ConfigError::io(path, err)),
        };

        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

        let tmp_path = tmp_path_for(path);
        std::fs::write(&tmp_path, yaml).map_err(|err| ConfigError::io(&tmp_path, err))?;
        std::fs::rename(&tmp_path, path).map_err(|err| ConfigError::io(path, err))?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_returns_empty_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("destinations.yaml");
        let config = Config::load(&path).unwrap();
        assert!(config.sessions.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("destinations.yaml");

        let mut config = Config::default();
        config.sessions.insert(
            "abc123".to_string(),
            SessionConfigEntry {
                path: "/home/alice/.claude/projects/-tmp/abc123.jsonl".to_string(),
                chat_a: vec!["C0123:456".to_string()],
                chat_b: vec!["-100999:789".to_string()],
            },
        );
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sessions.get("abc123"), config.sessions.get("abc123"));
    }

    #[test]
    fn save_does_not_leave_a_tmp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("destinations.yaml");
        Config::default().save(&path).unwrap();
        assert!(!tmp_path_for(&path).exists());
        assert!(path.exists());
    }

    #[test]
    fn session_config_entry_is_empty_with_no_destinations() {
        assert!(SessionConfigEntry::default().is_empty());
    }
}
