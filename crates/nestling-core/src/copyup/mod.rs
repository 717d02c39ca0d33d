//! Copy-up coordination.
//!
//! Delegates copying directories into the new root to a [`CopyUpDriver`]
//! and reports whether `/etc` was among them, which decides how resolver
//! files are installed later.

pub mod tmpfs_symlink;

use std::path::{Component, Path, PathBuf};

use nestling_common::constants::ETC_DIR;
use nestling_common::error::{ChildError, Result};

use crate::driver::CopyUpDriver;

/// Copies up `dirs` through `driver` and reports whether `/etc` was copied.
///
/// # Errors
///
/// Returns [`ChildError::Config`] if `dirs` is non-empty and no driver is
/// configured, and [`ChildError::Driver`] if the driver fails.
pub fn setup_copy_dirs(driver: Option<&dyn CopyUpDriver>, dirs: &[PathBuf]) -> Result<bool> {
    let Some(driver) = driver else {
        if dirs.is_empty() {
            return Ok(false);
        }
        return Err(ChildError::config(
            "a driver is required to copy up directories",
        ));
    };

    let copied = driver
        .copy_up(dirs)
        .map_err(|e| ChildError::driver("copy-up", e))?;
    let etc = Path::new(ETC_DIR);
    let etc_copied = copied.iter().any(|dir| clean(dir) == etc);
    tracing::info!(copied = ?copied, etc_copied, "directories copied up");
    Ok(etc_copied)
}

/// Lexically normalises an absolute path: drops `.` and trailing
/// separators and resolves `..` without touching the filesystem.
#[must_use]
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                let _ = out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}
