//! Crash-safe move and copy of single files.
//!
//! # Design
//! - The final destination name only ever refers to a complete write: bytes land in a
//!   temporary file inside the destination directory, are synced, then linked into place.
//! - A failed move never removes the source.
//! - Nothing is ever overwritten. Same-volume moves hard-link the source and then unlink
//!   it, temporary files are persisted without clobbering, and a name that was taken
//!   after it was chosen surfaces as a collision error.
//! - Names are handled as `OsStr` so non-UTF-8 base names keep their exact bytes.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};

/// Highest numbered variant tried before falling back to a `.dup` suffix.
pub const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 10_000;

const TEMP_PREFIX: &str = ".dropwatch-";

/// Build the `name (n).ext` sibling of `destination`.
#[must_use]
pub fn numbered_variant(destination: &Path, n: u32) -> PathBuf {
    let mut name = destination
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!(" ({n})"));
    if let Some(ext) = destination.extension() {
        name.push(".");
        name.push(ext);
    }
    destination.with_file_name(name)
}

/// Return `destination` when free, otherwise the first free numbered variant.
///
/// Falls back to `destination` with a `.dup` suffix when every variant below
/// [`MAX_DISAMBIGUATION_ATTEMPTS`] is taken.
#[must_use]
pub fn unique_destination(destination: &Path) -> PathBuf {
    if !occupied(destination) {
        return destination.to_path_buf();
    }
    (2..MAX_DISAMBIGUATION_ATTEMPTS)
        .map(|n| numbered_variant(destination, n))
        .find(|candidate| !occupied(candidate))
        .unwrap_or_else(|| {
            let mut fallback = destination.as_os_str().to_os_string();
            fallback.push(".dup");
            PathBuf::from(fallback)
        })
}

/// Look for a file in `dest_dir` that looks like `source` by name and size.
///
/// The exact base name is checked first, then `name (2).ext`, `name (3).ext`, …
/// until the first missing variant. A hit requires an identical, non-zero byte
/// size; contents are not compared.
///
/// # Errors
///
/// Returns an error when `source` cannot be stat'ed.
pub fn find_duplicate(source: &Path, dest_dir: &Path) -> FsOpsResult<Option<PathBuf>> {
    let size = fs::metadata(source)
        .map_err(|err| FsOpsError::io("duplicate.stat_source", source, err))?
        .len();
    if size == 0 {
        return Ok(None);
    }
    let Some(name) = source.file_name() else {
        return Ok(None);
    };

    let exact = dest_dir.join(name);
    if size_of(&exact) == Some(size) {
        return Ok(Some(exact));
    }
    for n in 2..MAX_DISAMBIGUATION_ATTEMPTS {
        let candidate = numbered_variant(&exact, n);
        match size_of(&candidate) {
            None => break,
            Some(candidate_size) if candidate_size == size => return Ok(Some(candidate)),
            Some(_) => {}
        }
    }
    Ok(None)
}

/// Move `source` to `destination`, which must not exist yet.
///
/// The source is hard-linked under the new name and then unlinked, which keeps
/// the inode on the same volume. When linking is impossible (for example across
/// volumes) the bytes are copied through a synced temporary file and the source
/// is removed only after the destination is in place.
///
/// # Errors
///
/// Returns a collision error (see [`FsOpsError::is_collision`]) when `destination`
/// already exists. Other failures leave the source untouched and no destination,
/// except a failed source removal, after which both exist.
pub(crate) fn move_file(source: &Path, destination: &Path) -> FsOpsResult<()> {
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(FsOpsError::io("move.link", destination, err));
        }
        Err(link_err) => {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                error = %link_err,
                "hard link failed; falling back to copy"
            );
            write_via_temp(source, destination)?;
        }
    }
    fs::remove_file(source).map_err(|err| FsOpsError::io("move.remove_source", source, err))
}

/// Copy `source` to `destination` through a synced temporary file.
///
/// # Errors
///
/// Returns an error if any step fails, including a collision when `destination`
/// appeared in the meantime; the temporary file is removed and nothing appears
/// under `destination`.
pub(crate) fn copy_file(source: &Path, destination: &Path) -> FsOpsResult<()> {
    write_via_temp(source, destination)
}

fn write_via_temp(source: &Path, destination: &Path) -> FsOpsResult<()> {
    let mut reader =
        File::open(source).map_err(|err| FsOpsError::io("transfer.open_source", source, err))?;
    let dir = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|err| FsOpsError::io("transfer.create_dir", dir, err))?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|err| FsOpsError::io("transfer.create_temp", dir, err))?;
    io::copy(&mut reader, temp.as_file_mut())
        .map_err(|err| FsOpsError::io("transfer.copy", temp.path(), err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| FsOpsError::io("transfer.sync", temp.path(), err))?;
    persist(temp, destination)
}

fn persist(temp: NamedTempFile, destination: &Path) -> FsOpsResult<()> {
    temp.persist_noclobber(destination)
        .map(drop)
        .map_err(|err| FsOpsError::io("transfer.persist", destination, err.error))
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn size_of(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|meta| meta.len())
}
