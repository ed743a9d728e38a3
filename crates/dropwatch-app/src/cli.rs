//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Route finished downloads into place by rule.
#[derive(Debug, Clone, Parser)]
#[command(name = "dropwatch", version, about = "Route finished downloads into place by rule")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(value_name = "CONFIG", env = "DROPWATCH_CONFIG")]
    pub config: PathBuf,
    /// Log level used when `RUST_LOG` is unset (e.g. `debug`).
    #[arg(long, env = "DROPWATCH_LOG_LEVEL")]
    pub log_level: Option<String>,
}
