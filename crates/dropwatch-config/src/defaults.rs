//! Default values applied to configuration documents.
//!
//! # Design
//! - Centralize defaults so document parsing and validation agree.
//! - Keep time-based defaults explicit in their unit.

/// Directory watched when the document does not name one.
pub(crate) const WATCH_DIR: &str = "~/Downloads";
/// Partial-download markers skipped when the document leaves `ignore_exts` empty.
pub(crate) const IGNORE_EXTS: &[&str] = &[".crdownload", ".download", ".part", ".partial"];
/// Window a file size must stay unchanged before dispatch.
pub(crate) const SETTLE_MILLIS: u64 = 1_500;
/// Interval between file size samples.
pub(crate) const POLL_MILLIS: u64 = 250;
/// Upper bound on a single remote upload.
pub(crate) const WEBDAV_TIMEOUT_SECS: u64 = 30;
