//! Typed configuration models.
//!
//! # Design
//! - `*Document` types mirror the YAML file one-to-one and reject unknown fields.
//! - `Config`/`Rule` are the validated, path-expanded form handed to the dispatcher.
//! - Validated values are immutable after load; nothing here performs IO.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Raw configuration document as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigDocument {
    /// Directory to watch (supports `~` expansion).
    pub watch_dir: String,
    /// Ordered rule list; the first matching rule wins.
    pub rules: Vec<RuleDocument>,
    /// Extensions that are never dispatched (partial-download markers).
    pub ignore_exts: Vec<String>,
    /// Stability window in milliseconds.
    pub settle_millis: u64,
    /// Interval between size samples, in milliseconds.
    pub poll_millis: u64,
    /// Remote upload sink settings.
    pub webdav: WebDavDocument,
    /// Emit JSON log lines instead of human-readable output.
    pub log_json: bool,
    /// Create missing destination directories before transferring.
    pub create_dest_dirs: bool,
    /// Show desktop notifications after successful transfers.
    pub notifications: bool,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            watch_dir: defaults::WATCH_DIR.to_string(),
            rules: Vec::new(),
            ignore_exts: defaults::IGNORE_EXTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            settle_millis: defaults::SETTLE_MILLIS,
            poll_millis: defaults::POLL_MILLIS,
            webdav: WebDavDocument::default(),
            log_json: false,
            create_dest_dirs: true,
            notifications: true,
        }
    }
}

/// Raw rule entry as written by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleDocument {
    /// Human-readable rule name used in logs.
    pub name: String,
    /// Shell-style globs matched against the base file name.
    pub patterns: Vec<String>,
    /// Extensions without a leading dot, case-insensitive.
    pub extensions: Vec<String>,
    /// Content-type prefixes such as `image/`.
    pub mime_prefixes: Vec<String>,
    /// `move` (default) or `copy`.
    pub action: String,
    /// Destination directory (supports `~` expansion).
    pub dest: String,
    /// Treat same-name, same-size files at the destination as duplicates.
    pub skip_duplicates: bool,
    /// Upload the transferred file to the remote sink.
    pub webdav_upload: bool,
    /// Remote path prefix used for uploads.
    pub webdav_path: String,
}

/// Raw remote sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebDavDocument {
    /// Base URL of the WebDAV endpoint; empty disables uploads.
    pub url: String,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Accept invalid TLS certificates.
    pub skip_tls_verify: bool,
    /// Upload timeout in seconds.
    pub timeout_sec: u64,
}

impl Default for WebDavDocument {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            skip_tls_verify: false,
            timeout_sec: defaults::WEBDAV_TIMEOUT_SECS,
        }
    }
}

/// Transfer action applied by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Relocate the file; the source disappears.
    #[default]
    Move,
    /// Duplicate the file; the source stays in place.
    Copy,
}

impl RuleAction {
    /// Render the action as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = String;

    /// Parse an action, trimming whitespace, ignoring case and mapping empty input to `move`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "move" => Ok(Self::Move),
            "copy" => Ok(Self::Copy),
            _ => Err(value.to_string()),
        }
    }
}

/// Validated routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Rule name used in logs and events.
    pub name: String,
    /// Shell-style globs matched case-sensitively against the base name.
    pub patterns: Vec<String>,
    /// Lower-cased extensions without a leading dot.
    pub extensions: Vec<String>,
    /// Content-type prefixes.
    pub mime_prefixes: Vec<String>,
    /// Transfer action.
    pub action: RuleAction,
    /// Expanded destination directory; `None` when the document left it empty.
    pub dest: Option<PathBuf>,
    /// Duplicate-skip flag.
    pub skip_duplicates: bool,
    /// Remote path prefix when the rule uploads; `None` disables upload.
    pub upload_prefix: Option<String>,
}

impl Rule {
    /// Whether the rule declares any matching criteria at all.
    #[must_use]
    pub fn has_criteria(&self) -> bool {
        !(self.patterns.is_empty() && self.extensions.is_empty() && self.mime_prefixes.is_empty())
    }
}

/// Validated remote sink settings.
#[derive(Clone, PartialEq, Eq)]
pub struct WebDavSettings {
    /// Base URL of the WebDAV endpoint.
    pub url: String,
    /// Basic-auth username; empty disables authentication.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Accept invalid TLS certificates.
    pub skip_tls_verify: bool,
    /// Upper bound the dispatcher waits for a single upload.
    pub timeout: Duration,
}

impl fmt::Debug for WebDavSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WebDavSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validated, path-expanded dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Expanded watch root.
    pub watch_dir: PathBuf,
    /// Ordered rules.
    pub rules: Vec<Rule>,
    /// Lower-cased ignored extensions without a leading dot.
    pub ignore_exts: Vec<String>,
    /// Stability window.
    pub settle: Duration,
    /// Interval between size samples.
    pub poll: Duration,
    /// Remote sink settings; `None` when no URL is configured.
    pub webdav: Option<WebDavSettings>,
    /// Emit JSON logs.
    pub log_json: bool,
    /// Create destination directories on demand.
    pub create_dest_dirs: bool,
    /// Desktop notifications enabled.
    pub notifications: bool,
}
