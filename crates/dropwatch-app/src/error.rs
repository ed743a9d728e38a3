//! # Design
//!
//! - Centralize application-level errors for startup; per-file failures never surface here.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use crate::upload::UploadError;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type. Every variant aborts startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or validated.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: dropwatch_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: dropwatch_telemetry::TelemetryError,
    },
    /// Rule patterns could not be compiled.
    #[error("rule compilation failed")]
    Rules {
        /// Source fsops error.
        source: dropwatch_fsops::FsOpsError,
    },
    /// The upload sink could not be built.
    #[error("upload sink setup failed")]
    Upload {
        /// Operation identifier.
        operation: &'static str,
        /// Source upload error.
        source: UploadError,
    },
    /// The filesystem watcher could not be started.
    #[error("filesystem watcher failed")]
    Watcher {
        /// Operation identifier.
        operation: &'static str,
        /// Directory being watched.
        path: PathBuf,
        /// Source notify error.
        source: notify::Error,
    },
    /// The configured watch root is unusable.
    #[error("invalid watch directory")]
    InvalidWatchDir {
        /// Configured watch root.
        path: PathBuf,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: dropwatch_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: dropwatch_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) fn watcher(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: notify::Error,
    ) -> Self {
        Self::Watcher {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Render an error and its source chain as a single `a: b: c` line.
pub(crate) fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            dropwatch_config::ConfigError::InvalidRuleAction {
                rule: "junk".to_string(),
                value: "delete".to_string(),
            },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.load",
                ..
            }
        ));

        let watcher = AppError::watcher(
            "watcher.watch",
            "/srv/incoming",
            notify::Error::generic("boom"),
        );
        assert!(matches!(watcher, AppError::Watcher { .. }));
        assert_eq!(watcher.to_string(), "filesystem watcher failed");
    }

    #[test]
    fn render_chain_joins_sources() {
        let err = dropwatch_fsops::FsOpsError::Vanished {
            path: PathBuf::from("a.bin"),
            source: io::Error::other("stat failed"),
        };
        assert_eq!(
            render_chain(&err),
            "file vanished while waiting for it to settle: stat failed"
        );
    }
}
