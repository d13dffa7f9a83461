//! Metadata store errors.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A state file exists but cannot be trusted. Never fall back to an empty
    /// store here: that would re-download everything and count it as new.
    #[error("corrupt state file {}: {reason}", .path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Atomic write failed; the previously persisted file is still intact.
    #[error("failed to persist {}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A caller broke single-writer discipline (e.g. inserted a duplicate).
    /// This is a logic bug; retrying cannot fix it.
    #[error("metadata store invariant violated: {0}")]
    InvariantViolation(String),
}

impl StoreError {
    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        StoreError::CorruptState {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, StoreError::InvariantViolation(_))
    }
}
