//! Write-completion detection by size polling.
//!
//! A file is stable once its size has stayed unchanged for `settle`, measured in
//! whole poll intervals after an initial baseline sample. The wait is bounded by
//! [`STABILITY_CEILING`] regardless of the configured intervals.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::trace;

use crate::error::{FsOpsError, FsOpsResult};

/// Hard upper bound on how long a single stability wait may take.
pub const STABILITY_CEILING: Duration = Duration::from_secs(5 * 60);

const MIN_POLL: Duration = Duration::from_millis(1);

/// Wait until the file at `path` stops changing size.
///
/// # Errors
///
/// Returns [`FsOpsError::Vanished`] as soon as a stat fails and
/// [`FsOpsError::Unstable`] once [`STABILITY_CEILING`] elapses.
pub async fn wait_until_stable(path: &Path, settle: Duration, poll: Duration) -> FsOpsResult<()> {
    wait_until_stable_with(path, settle, poll, || fs::metadata(path).map(|meta| meta.len())).await
}

/// Stability wait driven by an arbitrary size sampler.
///
/// `sample_size` is called once for the baseline and then once per poll interval.
///
/// # Errors
///
/// Same as [`wait_until_stable`].
pub async fn wait_until_stable_with<F>(
    path: &Path,
    settle: Duration,
    poll: Duration,
    mut sample_size: F,
) -> FsOpsResult<()>
where
    F: FnMut() -> io::Result<u64>,
{
    let poll = poll.max(MIN_POLL);
    let started = Instant::now();
    let vanished = |source| FsOpsError::Vanished {
        path: path.to_path_buf(),
        source,
    };

    let mut baseline = sample_size().map_err(vanished)?;
    let mut unchanged = Duration::ZERO;
    loop {
        sleep(poll).await;
        let size = sample_size().map_err(vanished)?;
        if size == baseline {
            unchanged = unchanged.saturating_add(poll);
            if unchanged >= settle {
                return Ok(());
            }
        } else {
            trace!(path = %path.display(), previous = baseline, size, "size changed");
            baseline = size;
            unchanged = Duration::ZERO;
        }

        let waited = started.elapsed();
        if waited >= STABILITY_CEILING {
            return Err(FsOpsError::Unstable {
                path: path.to_path_buf(),
                waited,
            });
        }
    }
}
