//! Per-file transfer plan.
//!
//! # Design
//! - Computed fresh for every dispatch and never persisted.
//! - Holds paths by value so the plan can cross into a blocking task.
//! - The planned name is a hint: if another writer takes it before the transfer
//!   lands, the name is resolved again instead of overwriting.

use std::path::{Path, PathBuf};

use dropwatch_config::RuleAction;
use tracing::debug;

use crate::error::FsOpsResult;
use crate::transfer;

/// Attempts made when the chosen destination keeps getting taken.
const MAX_TRANSFER_ATTEMPTS: u32 = 8;

/// Resolved destination and action for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    /// File being dispatched.
    pub source: PathBuf,
    /// Directory the matched rule routes to.
    pub dest_dir: PathBuf,
    /// Collision-resolved path inside `dest_dir` chosen at planning time.
    pub destination: PathBuf,
    /// Action taken by the matched rule.
    pub action: RuleAction,
}

impl TransferIntent {
    /// Plan a transfer of `source` into `dest_dir`, picking a free destination name.
    ///
    /// Returns `None` when `source` has no file name.
    #[must_use]
    pub fn plan(source: &Path, dest_dir: &Path, action: RuleAction) -> Option<Self> {
        let name = source.file_name()?;
        Some(Self {
            source: source.to_path_buf(),
            dest_dir: dest_dir.to_path_buf(),
            destination: transfer::unique_destination(&dest_dir.join(name)),
            action,
        })
    }

    /// Carry out the planned action and return the path the file landed at.
    ///
    /// # Errors
    ///
    /// Returns an error when the transfer fails. A failed move leaves the source
    /// in place and no file under the destination name; a failed copy leaves no
    /// destination. Existing files are never replaced.
    pub fn execute(&self) -> FsOpsResult<PathBuf> {
        let mut destination = self.destination.clone();
        let mut attempt = 1;
        loop {
            let result = match self.action {
                RuleAction::Move => transfer::move_file(&self.source, &destination),
                RuleAction::Copy => transfer::copy_file(&self.source, &destination),
            };
            match result {
                Err(err) if err.is_collision() && attempt < MAX_TRANSFER_ATTEMPTS => {
                    debug!(
                        source = %self.source.display(),
                        taken = %destination.display(),
                        "destination taken before transfer; choosing another name"
                    );
                    destination = transfer::unique_destination(&self.requested());
                    attempt += 1;
                }
                result => return result.map(|()| destination),
            }
        }
    }

    fn requested(&self) -> PathBuf {
        self.source
            .file_name()
            .map_or_else(|| self.destination.clone(), |name| self.dest_dir.join(name))
    }
}
