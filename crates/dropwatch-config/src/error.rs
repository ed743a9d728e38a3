//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
///
/// Every variant is fatal: the dispatcher refuses to start on any of them.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("failed to read configuration file")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path of the configuration file.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The document was not valid YAML or contained unknown fields.
    #[error("failed to parse configuration document")]
    Parse {
        /// Source YAML error (carries line/column information).
        source: serde_yaml::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: String,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A rule declared an action other than `move` or `copy`.
    #[error("invalid rule action")]
    InvalidRuleAction {
        /// Name of the offending rule.
        rule: String,
        /// Action value as written in the document.
        value: String,
    },
    /// A `~` path was used but the home directory could not be determined.
    #[error("home directory unavailable")]
    HomeDirUnavailable {
        /// Path that required home expansion.
        path: String,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
