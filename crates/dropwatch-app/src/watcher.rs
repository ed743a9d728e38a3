//! Filesystem event source for the watch root.
//!
//! Wraps `notify::RecommendedWatcher` and forwards its callback events into a
//! tokio channel. Only creations and renames trigger a dispatch; content writes
//! are too noisy while a download is still in progress.

use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};

const CHANNEL_CAPACITY: usize = 1024;

/// Non-recursive watcher over a single directory.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<notify::Event>>,
}

impl DirectoryWatcher {
    /// Start watching `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Watcher`] if the platform watcher cannot be created or
    /// cannot be attached to `dir`.
    pub fn start(dir: &Path) -> AppResult<Self> {
        let (sender, events) = mpsc::channel(CHANNEL_CAPACITY);
        let mut watcher = notify::recommended_watcher(move |event| {
            let _ = sender.blocking_send(event);
        })
        .map_err(|source| AppError::watcher("watcher.create", dir, source))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| AppError::watcher("watcher.watch", dir, source))?;
        Ok(Self {
            _watcher: watcher,
            events,
        })
    }

    /// Next raw event, or `None` once the watcher has shut down.
    pub async fn next(&mut self) -> Option<notify::Result<notify::Event>> {
        self.events.recv().await
    }
}

/// Paths in `event` that should be dispatched.
#[must_use]
pub fn dispatch_paths(event: &notify::Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) => event.paths.as_slice(),
        _ => &[],
    }
}
