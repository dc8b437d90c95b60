use std::path::PathBuf;
use thiserror::Error;

/// Errors from the claude projects directory discovery pass.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("claude projects directory not found: {path}")]
    ProjectsDirNotFound { path: PathBuf },

    #[error("cannot access claude projects directory: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("home directory not found")]
    HomeDirNotFound,
}

impl DiscoveryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::ProjectsDirNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors from building, persisting, and loading the session index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("IO error on index file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session index at {path}: {message}")]
    MalformedJson { path: PathBuf, message: String },

    #[error("a refresh was requested {retry_after_secs}s before the rate limit window closed")]
    RateLimited { retry_after_secs: u64 },

    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("project not found: {project}")]
    ProjectNotFound { project: String },
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from loading or persisting the destinations config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed destinations config at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_io_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err = DiscoveryError::io("/test/path", io_err);
        assert!(matches!(err, DiscoveryError::ProjectsDirNotFound { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DiscoveryError::io("/test/path", io_err);
        assert!(matches!(err, DiscoveryError::PermissionDenied { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        let err = DiscoveryError::io("/test/path", io_err);
        assert!(matches!(err, DiscoveryError::Io { .. }));
    }

    #[test]
    fn rate_limited_display_includes_retry_after() {
        let err = IndexError::RateLimited {
            retry_after_secs: 42,
        };
        assert!(err.to_string().contains("42"));
    }
}
