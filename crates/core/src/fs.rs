//! Filesystem helpers with error context.

use std::path::Path;
use tracing::trace;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Recursively copy `from` into `to`, creating `to` if needed.
///
/// Symlinks are recreated on Unix and followed elsewhere.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)
        .map_err(|e| Error::io(e, Some(to.to_path_buf()), "create directory"))?;

    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf);
            Error::io(e.into(), path, "walk directory")
        })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::metadata(format!("walked outside {}: {e}", from.display())))?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| Error::io(e, Some(target.clone()), "create directory"))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            trace!(from = ?entry.path(), to = ?target, "Copying file");
            std::fs::copy(entry.path(), &target)
                .map_err(|e| Error::io(e, Some(target.clone()), "copy file"))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    let link = std::fs::read_link(source)
        .map_err(|e| Error::io(e, Some(source.to_path_buf()), "read symlink"))?;
    std::os::unix::fs::symlink(&link, target)
        .map_err(|e| Error::io(e, Some(target.to_path_buf()), "create symlink"))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> Result<()> {
    if source.is_dir() {
        copy_dir_recursive(source, target)
    } else {
        std::fs::copy(source, target)
            .map(|_| ())
            .map_err(|e| Error::io(e, Some(target.to_path_buf()), "copy file"))
    }
}

/// Remove a directory tree if it exists.
///
/// # Errors
///
/// Returns an error if the directory exists and cannot be removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(e, Some(path.to_path_buf()), "remove directory")),
    }
}
