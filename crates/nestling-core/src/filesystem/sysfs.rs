//! Sysfs remount for freshly unshared network namespaces.
//!
//! A sysfs instance reflects the network namespace of the process that
//! mounted it, so `/sys/class/net` inherited from the parent does not show
//! devices created in the child's namespace. The child mounts its own
//! sysfs over `/sys`, carrying the existing `/sys/fs/cgroup` across the
//! remount through a staging bind.
//!
//! Mounting sysfs escalates through [`SYSFS_ATTEMPTS`]: read-write, then
//! read-only (the kernel refuses a read-write sysfs inside a namespace
//! whose outer sysfs is read-only), then none at all (a masked
//! `/sys/firmware` blocks even the read-only mount).

use std::fmt;
use std::io;
use std::path::Path;

use nestling_common::constants::{CGROUP_PATH, SYSFS_PATH, SYSFS_STAGING_PREFIX, TMP_DIR};
use nestling_common::error::{ChildError, Result};

use super::mount;

/// Which sysfs instance, if any, ended up mounted on `/sys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SysfsStatus {
    /// A read-write sysfs is mounted.
    ReadWrite,
    /// Only a read-only sysfs could be mounted.
    ReadOnly,
    /// No sysfs could be mounted; `/sys/class/net` may be stale.
    Unavailable,
}

impl fmt::Display for SysfsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadWrite => write!(f, "read-write"),
            Self::ReadOnly => write!(f, "read-only"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// One way of mounting sysfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysfsAttempt {
    /// Status reported when this attempt succeeds.
    pub status: SysfsStatus,
    /// Whether to mount read-only.
    pub readonly: bool,
}

/// Attempts in escalation order. Exhausting the list is tolerated and
/// reported as [`SysfsStatus::Unavailable`].
pub const SYSFS_ATTEMPTS: [SysfsAttempt; 2] = [
    SysfsAttempt {
        status: SysfsStatus::ReadWrite,
        readonly: false,
    },
    SysfsAttempt {
        status: SysfsStatus::ReadOnly,
        readonly: true,
    },
];

/// Walks `attempts` in order until `mount` succeeds.
///
/// Every failure is logged and tolerated.
pub fn escalate<F>(attempts: &[SysfsAttempt], mut mount: F) -> SysfsStatus
where
    F: FnMut(&SysfsAttempt) -> io::Result<()>,
{
    for (i, attempt) in attempts.iter().enumerate() {
        match mount(attempt) {
            Ok(()) => return attempt.status,
            Err(e) => match attempts.get(i + 1) {
                Some(next) => tracing::warn!(
                    error = %e,
                    failed = %attempt.status,
                    fallback = %next.status,
                    "failed to mount sysfs, falling back"
                ),
                None => tracing::warn!(
                    error = %e,
                    failed = %attempt.status,
                    "failed to mount sysfs, continuing without it"
                ),
            },
        }
    }
    SysfsStatus::Unavailable
}

/// Remounts sysfs on `/sys` while preserving `/sys/fs/cgroup`.
///
/// The staging directory under `/tmp` is removed on every exit path.
///
/// # Errors
///
/// Returns [`ChildError::NamespaceSetup`] if the staging directory cannot
/// be created or the cgroup bind cannot be created or moved back. Sysfs
/// mount failures are tolerated and reported through the returned status.
pub fn remount_sysfs() -> Result<SysfsStatus> {
    let staging = tempfile::Builder::new()
        .prefix(SYSFS_STAGING_PREFIX)
        .tempdir_in(TMP_DIR)
        .map_err(|e| {
            ChildError::namespace_setup(format!("creating a directory under {TMP_DIR}"), e)
        })?;
    let cgroup = Path::new(CGROUP_PATH);

    mount::bind_mount(cgroup, staging.path(), true).map_err(|e| {
        ChildError::namespace_setup(
            format!("binding {CGROUP_PATH} to {}", staging.path().display()),
            e,
        )
    })?;

    let status = escalate(&SYSFS_ATTEMPTS, |attempt| {
        mount::mount_filesystem("sysfs", Path::new(SYSFS_PATH), attempt.readonly)
    });

    restore_cgroup(staging.path(), cgroup, mount::move_mount, mount::detach)?;

    tracing::info!(sysfs = %status, "sysfs remounted");
    Ok(status)
}

/// Moves the staged cgroup bind at `staging` back onto `cgroup`.
///
/// If the move fails the bind is detached first, so removing the staging
/// directory afterwards cannot descend into the live cgroup hierarchy.
fn restore_cgroup<M, D>(staging: &Path, cgroup: &Path, move_mount: M, detach: D) -> Result<()>
where
    M: FnOnce(&Path, &Path) -> io::Result<()>,
    D: FnOnce(&Path) -> io::Result<()>,
{
    let Err(e) = move_mount(staging, cgroup) else {
        return Ok(());
    };
    if let Err(detach_err) = detach(staging) {
        tracing::warn!(
            error = %detach_err,
            staging = %staging.display(),
            "failed to detach staged cgroup bind"
        );
    }
    Err(ChildError::namespace_setup(
        format!("moving {} to {}", staging.display(), cgroup.display()),
        e,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> io::Error {
        io::Error::from(io::ErrorKind::PermissionDenied)
    }

    #[test]
    fn first_success_wins() {
        let mut tried = Vec::new();
        let status = escalate(&SYSFS_ATTEMPTS, |a| {
            tried.push(a.readonly);
            Ok(())
        });
        assert_eq!(status, SysfsStatus::ReadWrite);
        assert_eq!(tried, [false]);
    }

    #[test]
    fn falls_back_to_read_only() {
        let mut tried = Vec::new();
        let status = escalate(&SYSFS_ATTEMPTS, |a| {
            tried.push(a.readonly);
            if a.readonly { Ok(()) } else { Err(denied()) }
        });
        assert_eq!(status, SysfsStatus::ReadOnly);
        assert_eq!(tried, [false, true]);
    }

    #[test]
    fn exhausting_attempts_is_tolerated() {
        let mut calls = 0;
        let status = escalate(&SYSFS_ATTEMPTS, |_| {
            calls += 1;
            Err(denied())
        });
        assert_eq!(status, SysfsStatus::Unavailable);
        assert_eq!(calls, SYSFS_ATTEMPTS.len());
    }

    #[test]
    fn empty_attempt_list_is_unavailable() {
        assert_eq!(escalate(&[], |_| Ok(())), SysfsStatus::Unavailable);
    }

    #[test]
    fn restored_cgroup_is_not_detached() {
        let mut detached = false;
        restore_cgroup(
            Path::new("/tmp/nlsys0"),
            Path::new(CGROUP_PATH),
            |_, _| Ok(()),
            |_| {
                detached = true;
                Ok(())
            },
        )
        .unwrap();
        assert!(!detached);
    }

    #[test]
    fn failed_move_detaches_before_staging_is_removed() {
        let staging = tempfile::Builder::new()
            .prefix(SYSFS_STAGING_PREFIX)
            .tempdir()
            .unwrap();
        std::fs::create_dir(staging.path().join("child.slice")).unwrap();
        let mut detached = None;

        let err = restore_cgroup(
            staging.path(),
            Path::new(CGROUP_PATH),
            |_, _| Err(io::Error::from(io::ErrorKind::InvalidInput)),
            |path| {
                // The staged tree must still be intact when it is detached.
                assert!(path.join("child.slice").is_dir());
                detached = Some(path.to_path_buf());
                Ok(())
            },
        )
        .unwrap_err();

        assert!(matches!(err, ChildError::NamespaceSetup { .. }));
        assert!(err.to_string().contains(CGROUP_PATH));
        assert_eq!(detached.as_deref(), Some(staging.path()));
    }

    #[test]
    fn failed_detach_still_reports_the_move() {
        let err = restore_cgroup(
            Path::new("/tmp/nlsys0"),
            Path::new(CGROUP_PATH),
            |_, _| Err(io::Error::from(io::ErrorKind::InvalidInput)),
            |_| Err(denied()),
        )
        .unwrap_err();
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source, Some(io::Error::from(io::ErrorKind::InvalidInput).to_string()));
    }
}
