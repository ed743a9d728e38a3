//! Scratch directories and file writers for filesystem tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Create a scratch directory that is removed when the returned guard drops.
///
/// # Errors
///
/// Returns an error if the temporary directory cannot be created.
pub fn scratch_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .with_context(|| format!("failed to create scratch directory with prefix {prefix}"))
}

/// Write `contents` to `dir/name`, creating `dir` when missing.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Write a file of exactly `len` bytes filled with `fill`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_sized(dir: &Path, name: &str, len: usize, fill: u8) -> Result<PathBuf> {
    write_file(dir, name, &vec![fill; len])
}
