//! Startup catch-up over files that arrived while the watcher was down.

use std::path::Path;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::dispatch::{DispatchOutcome, Dispatcher, Trigger};

/// Dispatch every direct, non-directory child of `watch_dir` in name order.
///
/// Runs sequentially and skips the stability wait. Unreadable entries are logged
/// and skipped. Returns the outcomes in dispatch order.
pub async fn catch_up(dispatcher: &Dispatcher, watch_dir: &Path) -> Vec<DispatchOutcome> {
    let mut outcomes = Vec::new();
    let entries = WalkDir::new(watch_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in entries {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => {}
            Ok(entry) => outcomes.push(dispatcher.dispatch(entry.path(), Trigger::CatchUp).await),
            Err(err) => warn!(
                watch_dir = %watch_dir.display(),
                error = %err,
                "catch-up entry unreadable"
            ),
        }
    }
    info!(
        watch_dir = %watch_dir.display(),
        files = outcomes.len(),
        "catch-up scan finished"
    );
    outcomes
}
