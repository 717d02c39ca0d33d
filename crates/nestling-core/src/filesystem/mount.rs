//! Mount utilities for the child's mount namespace.
//!
//! Thin wrappers over `mount(2)` and `umount2(2)` that report failures as
//! [`std::io::Error`] so callers can attach their own context.

use std::io;
use std::path::Path;

/// Mounts a fresh instance of `fstype` on `target`.
///
/// # Errors
///
/// Returns the `mount(2)` errno as an I/O error.
#[cfg(target_os = "linux")]
pub fn mount_filesystem(fstype: &str, target: &Path, readonly: bool) -> io::Result<()> {
    use nix::mount::{MsFlags, mount};

    let flags = if readonly {
        MsFlags::MS_RDONLY
    } else {
        MsFlags::empty()
    };
    mount(Some("none"), target, Some(fstype), flags, None::<&str>)?;
    tracing::debug!(fstype, target = %target.display(), readonly, "mounted filesystem");
    Ok(())
}

/// Creates a bind mount from `source` to `target`.
///
/// With `recursive`, submounts of `source` are bound as well.
///
/// # Errors
///
/// Returns the `mount(2)` errno as an I/O error.
#[cfg(target_os = "linux")]
pub fn bind_mount(source: &Path, target: &Path, recursive: bool) -> io::Result<()> {
    use nix::mount::{MsFlags, mount};

    let mut flags = MsFlags::MS_BIND;
    if recursive {
        flags |= MsFlags::MS_REC;
    }
    mount(Some(source), target, None::<&str>, flags, None::<&str>)?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        recursive,
        "created bind mount"
    );
    Ok(())
}

/// Atomically moves the mount at `source` to `target`.
///
/// # Errors
///
/// Returns the `mount(2)` errno as an I/O error.
#[cfg(target_os = "linux")]
pub fn move_mount(source: &Path, target: &Path) -> io::Result<()> {
    use nix::mount::{MsFlags, mount};

    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_MOVE,
        None::<&str>,
    )?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        "moved mount"
    );
    Ok(())
}

/// Lazily detaches the mount at `target` together with its submounts.
///
/// # Errors
///
/// Returns the `umount2(2)` errno as an I/O error.
#[cfg(target_os = "linux")]
pub fn detach(target: &Path) -> io::Result<()> {
    nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH)?;
    tracing::debug!(target = %target.display(), "detached mount");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "Linux required for namespace mounts",
    )
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn mount_filesystem(_fstype: &str, _target: &Path, _readonly: bool) -> io::Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn bind_mount(_source: &Path, _target: &Path, _recursive: bool) -> io::Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn move_mount(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error.
#[cfg(not(target_os = "linux"))]
pub fn detach(_target: &Path) -> io::Result<()> {
    Err(unsupported())
}
