//! Error types for stagewatch.
//!
//! Only infrastructure failures are errors. A checker that reports problems
//! returns `false`, a missing file is handled where it is stat'ed, and a
//! cancelled pass simply stops reporting.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = StagewatchError> = std::result::Result<T, E>;

/// The main error type for stagewatch operations.
#[derive(Debug, Error)]
pub enum StagewatchError {
    /// The persisted watermark file exists but could not be decoded.
    #[error("Corrupt state file {}: {source}", path.display())]
    StateFile {
        /// Path of the state file.
        path: PathBuf,
        /// The decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The project configuration file could not be decoded.
    #[error("Invalid configuration {}: {source}", path.display())]
    Config {
        /// Path of the configuration file.
        path: PathBuf,
        /// The decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// A collaborator could not be launched or produced unreadable output.
    #[error("{name}: {message}")]
    Collaborator {
        /// Collaborator name (e.g. "compiler", "tests").
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A file-system operation failed on a specific path.
    #[error("{}: {source}", path.display())]
    Path {
        /// The path involved.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// The file-system watcher failed.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StagewatchError {
    /// Creates a collaborator error.
    #[must_use]
    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Wraps an IO error with the path it happened on.
    #[must_use]
    pub fn at_path(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Path {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Returns true when the error means the file simply isn't there.
#[must_use]
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}
