//! YAML configuration loading.
//!
//! # Design
//! - Read the whole document once at startup; nothing is reloaded afterwards.
//! - Defaults are applied by serde, unknown fields fail the parse.
//! - `~` resolves against the current user's home so downstream code only sees
//!   expanded paths.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{Config, ConfigDocument};
use crate::validate::validate_document;

/// Load, parse and validate the configuration file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML, contains
/// unknown fields, or fails validation.
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&contents)?;
    debug!(
        path = %path.display(),
        rules = config.rules.len(),
        watch_dir = %config.watch_dir.display(),
        "configuration loaded"
    );
    Ok(config)
}

/// Parse and validate a configuration document held in memory.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML, contains unknown fields,
/// or fails validation.
pub fn parse_config(contents: &str) -> ConfigResult<Config> {
    let document = parse_document(contents)?;
    let home = dirs::home_dir();
    validate_document(document, home.as_deref())
}

fn parse_document(contents: &str) -> ConfigResult<ConfigDocument> {
    if contents.trim().is_empty() {
        return Ok(ConfigDocument::default());
    }
    serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse { source })
}
