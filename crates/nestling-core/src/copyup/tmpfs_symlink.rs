//! tmpfs+symlink copy-up driver.
//!
//! Each directory is replaced by a tmpfs holding one relative symlink per
//! original entry. The original tree stays reachable under a hidden
//! `.ro<name>` bind inside the tmpfs, so every entry still resolves, yet
//! any of them can be removed and recreated as a real file.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use nestling_common::constants::{COPY_UP_STAGING_PREFIX, TMP_DIR};
use nestling_common::error::BoxError;
use thiserror::Error;

use super::clean;
use crate::driver::CopyUpDriver;
use crate::filesystem::mount;

/// Failure to copy up a single directory.
#[derive(Debug, Error)]
pub enum CopyUpError {
    /// The directory cannot be copied up with this driver.
    #[error("{0} cannot be copied up")]
    Unsupported(PathBuf),
    /// A step of the copy-up failed.
    #[error("copying up {dir}: {step}")]
    Step {
        /// Directory being copied up.
        dir: PathBuf,
        /// What was being done.
        step: &'static str,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Copy-up driver backed by tmpfs and symlinks.
#[derive(Debug, Clone, Default)]
pub struct TmpfsSymlinkDriver;

impl CopyUpDriver for TmpfsSymlinkDriver {
    fn copy_up(&self, dirs: &[PathBuf]) -> Result<Vec<PathBuf>, BoxError> {
        let mut copied = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let dir = clean(dir);
            copy_up_dir(&dir)?;
            tracing::debug!(dir = %dir.display(), "copied up");
            copied.push(dir);
        }
        Ok(copied)
    }
}

/// Name of the hidden bind of the original tree inside the tmpfs.
fn read_only_name(dir: &Path) -> Result<String, CopyUpError> {
    if dir == Path::new(TMP_DIR) {
        return Err(CopyUpError::Unsupported(dir.to_path_buf()));
    }
    dir.file_name()
        .map(|name| format!(".ro{}", name.to_string_lossy()))
        .ok_or_else(|| CopyUpError::Unsupported(dir.to_path_buf()))
}

fn failed<'a>(dir: &'a Path, step: &'static str) -> impl FnOnce(io::Error) -> CopyUpError + 'a {
    move |source| CopyUpError::Step {
        dir: dir.to_path_buf(),
        step,
        source,
    }
}

fn copy_up_dir(dir: &Path) -> Result<(), CopyUpError> {
    let ro_name = read_only_name(dir)?;
    let staging = tempfile::Builder::new()
        .prefix(COPY_UP_STAGING_PREFIX)
        .tempdir_in(TMP_DIR)
        .map_err(failed(dir, "creating staging directory"))?;
    mount::mount_filesystem("tmpfs", staging.path(), false)
        .map_err(failed(dir, "mounting tmpfs"))?;

    if let Err(e) = populate(dir, staging.path(), &ro_name) {
        // The staging guard removes recursively: detach first so it cannot
        // descend into the bind of the original.
        if let Err(detach) = mount::detach(staging.path()) {
            tracing::warn!(error = %detach, "failed to detach copy-up staging tmpfs");
        }
        return Err(e);
    }
    Ok(())
}

fn populate(dir: &Path, staging: &Path, ro_name: &str) -> Result<(), CopyUpError> {
    let ro = staging.join(ro_name);
    fs::create_dir(&ro).map_err(failed(dir, "creating read-only mount point"))?;
    mount::bind_mount(dir, &ro, true).map_err(failed(dir, "binding original directory"))?;

    for entry in fs::read_dir(dir).map_err(failed(dir, "listing original directory"))? {
        let name = entry.map_err(failed(dir, "listing original directory"))?.file_name();
        symlink(Path::new(ro_name).join(&name), staging.join(&name))
            .map_err(failed(dir, "creating symlink"))?;
    }

    mount::move_mount(staging, dir).map_err(failed(dir, "moving tmpfs into place"))
}
