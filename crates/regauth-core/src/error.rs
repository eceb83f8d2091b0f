use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the credential store, the scope resolver and the
/// login/logout orchestrator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no credentials stored for {0}")]
    NotFound(String),

    #[error("auth file {path} is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("permission denied accessing {path}")]
    PermissionDenied { path: PathBuf },

    #[error("{target}: repository-scoped credentials are not supported here, use the registry host only")]
    ScopeNotSupported { target: String },

    #[error("invalid registry target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("timed out waiting for lock on {path}")]
    LockTimeout { path: PathBuf },

    #[error("not logged into {target}")]
    NotLoggedIn { target: String },

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

impl StoreError {
    /// Map an IO error on `path` to the matching store error kind.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied { path },
            _ => StoreError::Io { path, source },
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::StoreCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only affects a single target and leaves the store usable.
    pub fn is_target_scoped(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::ScopeNotSupported { .. }
                | StoreError::InvalidTarget { .. }
                | StoreError::NotLoggedIn { .. }
                | StoreError::InvalidCredentials(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_permission_denied() {
        let err = StoreError::from_io(
            "/tmp/auth.json",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
    }

    #[test]
    fn test_from_io_other() {
        let err = StoreError::from_io("/tmp/auth.json", std::io::Error::other("disk on fire"));
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(err.to_string().contains("/tmp/auth.json"));
    }

    #[test]
    fn test_target_scoped() {
        assert!(StoreError::ScopeNotSupported { target: "quay.io/x".into() }.is_target_scoped());
        assert!(!StoreError::corrupt("/a", "bad json").is_target_scoped());
    }
}
