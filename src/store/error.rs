//! Error types for the session store.
//!
//! The taxonomy is deliberately small: a caller either asked for something
//! that isn't there (`NotFound`), raced a create (`AlreadyExists`, absorbed
//! internally and never surfaced), handed us an ID we refuse to route
//! (`InvalidId`), or hit a real environment failure (`RandomSource`, `Io`,
//! `NotADirectory`). Every failure is a returned value; the store never
//! aborts the process.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced by the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session file does not exist (read/update/timestamp).
    #[error("session not found: {id}")]
    NotFound {
        /// The ID that was looked up
        id: String,
    },

    /// A freshly generated ID collided with an existing file.
    /// The create path retries; callers of the public API never see this.
    #[error("session already exists: {id}")]
    AlreadyExists {
        /// The colliding ID
        id: String,
    },

    /// The supplied ID is too short or contains bytes outside the
    /// 64-symbol alphabet. IDs are spliced into filesystem paths, so
    /// nothing outside the alphabet is ever routed.
    #[error("invalid session id: {id:?}")]
    InvalidId {
        /// The rejected ID
        id: String,
    },

    /// The operating system randomness source failed while generating
    /// an ID. The store cannot safely issue tokens without it.
    #[error("random source failure: {0}")]
    RandomSource(String),

    /// An unexpected filesystem failure (permissions, disk, ...).
    #[error("{op} failed for {path}: {source}")]
    Io {
        /// The operation that failed (e.g. "create", "purge scan")
        op: &'static str,
        /// The affected path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configured save path exists but is not a directory.
    #[error("save path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl SessionError {
    /// Wraps an I/O error with the failing operation and path.
    pub(crate) fn io(op: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        SessionError::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns `true` for the not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound { .. })
    }
}

/// Result type for store operations.
pub type SessionResult<T> = Result<T, SessionError>;
