//! Discovers session files under the claude projects directory, extracts
//! their metadata, and maintains a persisted [`SessionIndex`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use session_watch_types::{Project, Session, SessionIndex, SESSION_INDEX_VERSION};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::IndexError;
use crate::{metadata, paths};

/// Tunables for a single [`Indexer`] instance.
///
/// Grounded on the original implementation's `IndexConfig`: every default
/// here matches its defaults.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// How often the background refresh loop should call `refresh(false)`.
    /// Not consulted by `refresh`/`get_index` themselves — only by the
    /// server binary's scheduler.
    pub refresh_interval_secs: u64,
    /// Soft cap recorded per project; exceeding it logs a warning rather
    /// than dropping sessions, so a refresh always reflects discovery in
    /// full.
    pub max_sessions_per_project: usize,
    /// Whether transcripts that are entirely subagent turns are indexed at
    /// all.
    pub include_subagents: bool,
    /// Whether the index is written to `<state_dir>/search_index.json`.
    pub persist: bool,
    /// A persisted index older than this is rebuilt from scratch instead of
    /// trusted.
    pub max_index_age_hours: f64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            max_sessions_per_project: 100,
            include_subagents: false,
            persist: true,
            max_index_age_hours: 1.0,
        }
    }
}

const REFRESH_REQUEST_WINDOW_SECS: u64 = 60;
const INDEX_FILE_NAME: &str = "search_index.json";

/// Owns the session index over one or more `~/.claude/projects`-shaped
/// roots, with rate-limited, lock-guarded refresh.
pub struct Indexer {
    roots: Vec<PathBuf>,
    state_dir: PathBuf,
    config: IndexerConfig,
    index: Mutex<Option<SessionIndex>>,
    last_refresh_request: std::sync::Mutex<Option<Instant>>,
}

impl Indexer {
    /// Build an indexer over a single root directory.
    pub fn new(projects_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>, config: IndexerConfig) -> Self {
        Self::with_roots(vec![projects_dir.into()], state_dir, config)
    }

    /// Build an indexer over several root directories, each scanned the same
    /// way — every root's immediate subdirectories are project directories.
    pub fn with_roots(roots: Vec<PathBuf>, state_dir: impl Into<PathBuf>, config: IndexerConfig) -> Self {
        Self {
            roots,
            state_dir: state_dir.into(),
            config,
            index: Mutex::new(None),
            last_refresh_request: std::sync::Mutex::new(None),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.state_dir.join(INDEX_FILE_NAME)
    }

    /// Return the current index, building or loading it on first access.
    /// Never rate limited — only `refresh` is.
    pub async fn get_index(&self) -> Result<SessionIndex, IndexError> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_or_build_index().await?);
        }
        Ok(guard.as_ref().expect("just populated").clone())
    }

    /// Trigger a refresh. Non-forced calls are rate limited to one per
    /// [`REFRESH_REQUEST_WINDOW_SECS`] to keep a chatty caller (e.g. a chat
    /// command handler hit repeatedly) from triggering a full filesystem
    /// walk on every request.
    pub async fn refresh(&self, force: bool) -> Result<SessionIndex, IndexError> {
        if !force {
            let mut last = self.last_refresh_request.lock().unwrap();
            if let Some(previous) = *last {
                let elapsed = previous.elapsed().as_secs();
                if elapsed < REFRESH_REQUEST_WINDOW_SECS {
                    return Err(IndexError::RateLimited {
                        retry_after_secs: REFRESH_REQUEST_WINDOW_SECS - elapsed,
                    });
                }
            }
            *last = Some(Instant::now());
        }

        let mut guard = self.index.lock().await;
        let current = match guard.take() {
            Some(existing) => existing,
            None => self.load_or_build_index().await?,
        };
        let refreshed = self.do_refresh(current).await?;
        *guard = Some(refreshed.clone());
        Ok(refreshed)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session, IndexError> {
        let index = self.get_index().await?;
        index
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| IndexError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    pub async fn get_project(&self, encoded_name: &str) -> Result<Project, IndexError> {
        let index = self.get_index().await?;
        index
            .projects
            .get(encoded_name)
            .cloned()
            .ok_or_else(|| IndexError::ProjectNotFound {
                project: encoded_name.to_string(),
            })
    }

    async fn load_or_build_index(&self) -> Result<SessionIndex, IndexError> {
        if self.config.persist {
            if let Some(persisted) = self.load_persisted_index()? {
                return self.do_refresh(persisted).await;
            }
        }
        self.do_refresh(SessionIndex::empty(Utc::now())).await
    }

    fn load_persisted_index(&self) -> Result<Option<SessionIndex>, IndexError> {
        let path = self.index_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(IndexError::io(&path, err)),
        };

        let index: SessionIndex = serde_json::from_str(&contents).map_err(|err| IndexError::MalformedJson {
            path: path.clone(),
            message: err.to_string(),
        })?;

        if index.version != SESSION_INDEX_VERSION {
            debug!(path = %path.display(), "persisted index has a stale schema version, rebuilding");
            return Ok(None);
        }

        let age_hours = (Utc::now() - index.last_refresh).num_seconds() as f64 / 3600.0;
        if age_hours > self.config.max_index_age_hours {
            debug!(age_hours, "persisted index is older than max_index_age_hours, rebuilding");
            return Ok(None);
        }

        Ok(Some(index))
    }

    fn save_index(&self, index: &SessionIndex) -> Result<(), IndexError> {
        if !self.config.persist {
            return Ok(());
        }
        let path = self.index_path();
        let json = serde_json::to_string_pretty(index).map_err(|err| IndexError::MalformedJson {
            path: path.clone(),
            message: err.to_string(),
        })?;

        let tmp_path = {
            let mut os = path.as_os_str().to_os_string();
            os.push(".tmp");
            PathBuf::from(os)
        };
        std::fs::write(&tmp_path, json).map_err(|err| IndexError::io(&tmp_path, err))?;
        std::fs::rename(&tmp_path, &path).map_err(|err| IndexError::io(&path, err))?;
        Ok(())
    }

    /// Rebuild `index` from the current state of disk. Incremental: files
    /// whose mtime hasn't changed since the last refresh are not
    /// re-parsed.
    async fn do_refresh(&self, mut index: SessionIndex) -> Result<SessionIndex, IndexError> {
        let start = Instant::now();
        let discovered = self.discover_session_files()?;

        let mut seen_paths = std::collections::HashSet::new();
        for (project_encoded, session_id, file_path, mtime) in discovered {
            let path_key = file_path.to_string_lossy().to_string();
            seen_paths.insert(path_key.clone());

            let unchanged = index
                .file_mtimes
                .get(&path_key)
                .is_some_and(|known| (*known - mtime).abs() < f64::EPSILON);
            if unchanged && index.sessions.contains_key(&session_id) {
                continue;
            }

            match self.process_file(&project_encoded, &session_id, &file_path) {
                Ok(Some(session)) => {
                    if let Some(existing) = index.sessions.get(&session_id) {
                        if existing.file_path != session.file_path {
                            warn!(
                                session_id,
                                previous_path = %existing.file_path.display(),
                                new_path = %session.file_path.display(),
                                "session_id collision across two different files, overwriting"
                            );
                        }
                    }
                    index.file_mtimes.insert(path_key, mtime);
                    index.sessions.insert(session_id, session);
                }
                Ok(None) => {
                    // Filtered out (e.g. pure subagent transcript with
                    // include_subagents disabled) — still record the mtime
                    // so we don't keep re-reading an unchanged file.
                    index.file_mtimes.insert(path_key, mtime);
                }
                Err(err) => {
                    warn!(path = %file_path.display(), error = %err, "failed to process session file, skipping");
                }
            }
        }

        let removed: Vec<String> = index
            .sessions
            .values()
            .filter(|s| !seen_paths.contains(&s.file_path.to_string_lossy().to_string()))
            .map(|s| s.session_id.clone())
            .collect();
        for session_id in &removed {
            self.remove_session(&mut index, session_id);
        }
        index.file_mtimes.retain(|path, _| seen_paths.contains(path));

        self.rebuild_project_info(&mut index);

        index.last_refresh = Utc::now();
        index.refresh_duration_ms = start.elapsed().as_millis() as u64;

        self.save_index(&index)?;
        info!(
            sessions = index.sessions.len(),
            projects = index.projects.len(),
            duration_ms = index.refresh_duration_ms,
            "index refreshed"
        );
        Ok(index)
    }

    fn remove_session(&self, index: &mut SessionIndex, session_id: &str) {
        index.sessions.remove(session_id);
    }

    /// Recursively find every session file under every root, two levels
    /// deep: `<root>/<project_encoded>/...`. A file nested anywhere under a
    /// `subagents` path component is still discovered here; it's classified
    /// and optionally skipped in [`Self::process_file`], matching the
    /// spec's "discover, then classify" order.
    fn discover_session_files(&self) -> Result<Vec<(String, String, PathBuf, f64)>, IndexError> {
        let mut found = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                debug!(path = %root.display(), "configured projects root does not exist, skipping");
                continue;
            }
            if !root.is_dir() {
                warn!(path = %root.display(), "configured projects root is not a directory, skipping");
                continue;
            }

            for project_entry in walkdir::WalkDir::new(root)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir())
            {
                let project_encoded = project_entry.file_name().to_string_lossy().to_string();

                for session_entry in walkdir::WalkDir::new(project_entry.path())
                    .min_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("jsonl"))
                {
                    let session_id = session_entry
                        .path()
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default();
                    let file_path = session_entry.path().to_path_buf();
                    let mtime = file_mtime_secs(&file_path).unwrap_or(0.0);
                    found.push((project_encoded.clone(), session_id, file_path, mtime));
                }
            }
        }
        Ok(found)
    }

    fn process_file(&self, project_encoded: &str, session_id: &str, file_path: &Path) -> std::io::Result<Option<Session>> {
        if !self.config.include_subagents && metadata::is_subagent_session(file_path) {
            return Ok(None);
        }

        let meta = metadata::extract(file_path)?;
        let fs_meta = std::fs::metadata(file_path)?;

        let created_at = fs_meta
            .created()
            .unwrap_or_else(|_| fs_meta.modified().unwrap_or_else(|_| std::time::SystemTime::now()))
            .into();
        let modified_at: DateTime<Utc> = fs_meta.modified().unwrap_or_else(|_| std::time::SystemTime::now()).into();

        let decoded_path = paths::decode_project_path(project_encoded);
        let display_name = paths::display_name(&decoded_path);

        if paths::is_ambiguous_encoding(project_encoded) {
            debug!(
                project_encoded,
                decoded = %decoded_path,
                "possibly ambiguous legacy path encoding"
            );
        }

        Ok(Some(Session {
            session_id: session_id.to_string(),
            project_encoded: project_encoded.to_string(),
            project_display_name: display_name,
            file_path: file_path.to_path_buf(),
            summary: meta.summary,
            created_at,
            modified_at,
            size_bytes: fs_meta.len(),
            line_count: meta.line_count,
            has_subagents: metadata::has_subagents_dir(file_path),
        }))
    }

    fn rebuild_project_info(&self, index: &mut SessionIndex) {
        index.projects.clear();
        for session in index.sessions.values() {
            let project = index
                .projects
                .entry(session.project_encoded.clone())
                .or_insert_with(|| {
                    let decoded = paths::decode_project_path(&session.project_encoded);
                    Project::new(session.project_encoded.clone(), decoded.clone(), paths::display_name(&decoded))
                });
            project.session_ids.push(session.session_id.clone());
            project.total_size_bytes += session.size_bytes;
            project.latest_modified_at = Some(match project.latest_modified_at {
                Some(existing) if existing >= session.modified_at => existing,
                _ => session.modified_at,
            });
        }

        for project in index.projects.values() {
            if project.session_ids.len() > self.config.max_sessions_per_project {
                warn!(
                    project = %project.display_name,
                    count = project.session_ids.len(),
                    cap = self.config.max_sessions_per_project,
                    "project exceeds max_sessions_per_project"
                );
            }
        }
    }
}

fn file_mtime_secs(path: &Path) -> std::io::Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Ok(since_epoch.as_secs_f64())
}
