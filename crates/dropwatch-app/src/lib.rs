#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! dropwatch application wiring.
//!
//! Layout: `bootstrap.rs` (startup and watch loop), `dispatch.rs` (per-path state
//! machine), `inflight.rs` (per-path claims), `upload.rs` (remote sink),
//! `notifier.rs` (desktop notifications), `watcher.rs` (filesystem events),
//! `scan.rs` (startup catch-up), `cli.rs` (arguments).

/// Application bootstrap and the watch loop.
pub mod bootstrap;
/// Command-line arguments.
pub mod cli;
/// Dispatch coordinator.
pub mod dispatch;
/// Application error types.
pub mod error;
/// In-flight path claims.
pub mod inflight;
/// Desktop notifications.
pub mod notifier;
/// Startup catch-up scan.
pub mod scan;
/// Remote upload sink.
pub mod upload;
/// Filesystem event source.
pub mod watcher;

pub use bootstrap::{run_app, run_app_with};
pub use cli::Cli;
pub use dispatch::{DispatchOutcome, Dispatcher, Trigger, UploadStatus};
pub use error::{AppError, AppResult};
pub use upload::{UploadError, UploadSink, UploadTarget, WebDavSink};
