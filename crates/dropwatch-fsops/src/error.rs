//! # Design
//!
//! - Provide structured, constant-message errors for the dispatch filesystem core.
//! - Capture operation context (paths, patterns, rule names) for logs and tests.
//! - Keep stability timeouts distinct from generic IO failures.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the filesystem core.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Globset compilation failures.
    #[error("fsops glob failure")]
    Glob {
        /// Rule that declared the pattern.
        rule: String,
        /// Glob pattern that failed to compile.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// The file disappeared while its size was being sampled.
    #[error("file vanished while waiting for it to settle")]
    Vanished {
        /// Path that could no longer be stat'ed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The file kept changing size until the safety ceiling elapsed.
    #[error("file did not stabilize")]
    Unstable {
        /// Path that never settled.
        path: PathBuf,
        /// Time spent waiting before giving up.
        waited: Duration,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn glob(rule: &str, pattern: &str, source: globset::Error) -> Self {
        Self::Glob {
            rule: rule.to_string(),
            pattern: pattern.to_string(),
            source,
        }
    }

    /// Whether the error reports that the destination name was taken by someone else.
    #[must_use]
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::AlreadyExists)
    }

    /// Whether the error is the stability timeout rather than an IO condition.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Unstable { .. })
    }
}
