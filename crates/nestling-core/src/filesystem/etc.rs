//! DNS reconciliation for `/etc/resolv.conf` and `/etc/hosts`.
//!
//! When `/etc` was copied up the files are rewritten in place and persist
//! as real files of the copied root. Otherwise substitutes are written to
//! the state directory and bind-mounted over the originals.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nestling_common::constants::{HOSTS, RESOLV_CONF};
use nestling_common::error::{ChildError, Result};

use super::mount;

/// How resolver files reach the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsStrategy {
    /// `/etc` is a copied-up, writable directory: write the files directly.
    WriteInPlace,
    /// `/etc` is shared with the host: bind-mount substitutes over it.
    BindMount,
}

impl DnsStrategy {
    /// Picks the strategy from the copy-up result.
    #[must_use]
    pub const fn for_copy_up(etc_copied: bool) -> Self {
        if etc_copied {
            Self::WriteInPlace
        } else {
            Self::BindMount
        }
    }
}

/// Renders `resolv.conf` with one `nameserver` line per entry.
#[must_use]
pub fn resolv_conf(dns: &[String]) -> String {
    dns.iter().map(|server| format!("nameserver {server}\n")).collect()
}

/// Renders `hosts` as the existing table plus entries for `hostname`.
#[must_use]
pub fn hosts(existing: &str, hostname: &str) -> String {
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("127.0.0.1 {hostname}\n::1 {hostname}\n"));
    out
}

/// Writes resolver files into `etc_dir` according to `strategy`.
///
/// `state_dir` receives the substitutes for [`DnsStrategy::BindMount`].
///
/// # Errors
///
/// Returns [`ChildError::Io`] if a file cannot be read or written and
/// [`ChildError::NamespaceSetup`] if a bind mount fails.
pub fn reconcile(
    strategy: DnsStrategy,
    etc_dir: &Path,
    state_dir: &Path,
    dns: &[String],
    hostname: &str,
) -> Result<()> {
    reconcile_with(strategy, etc_dir, state_dir, dns, hostname, |source, target| {
        mount::bind_mount(source, target, false)
    })
}

/// [`reconcile`] with the bind mount used by [`DnsStrategy::BindMount`]
/// supplied by the caller.
///
/// # Errors
///
/// Same as [`reconcile`].
pub fn reconcile_with<B>(
    strategy: DnsStrategy,
    etc_dir: &Path,
    state_dir: &Path,
    dns: &[String],
    hostname: &str,
    mut bind: B,
) -> Result<()>
where
    B: FnMut(&Path, &Path) -> io::Result<()>,
{
    let resolv = resolv_conf(dns);
    let host_table = hosts(&read_existing(&etc_dir.join(HOSTS))?, hostname);

    match strategy {
        DnsStrategy::WriteInPlace => {
            replace_file(&etc_dir.join(RESOLV_CONF), &resolv)?;
            replace_file(&etc_dir.join(HOSTS), &host_table)?;
        }
        DnsStrategy::BindMount => {
            tracing::warn!(
                "mounting {RESOLV_CONF} and {HOSTS} without copying up {}; the mounts \
                 disappear if the host recreates these files, copying up /etc is recommended",
                etc_dir.display()
            );
            for (name, contents) in [(RESOLV_CONF, &resolv), (HOSTS, &host_table)] {
                let substitute = write_substitute(state_dir, name, contents)?;
                let target = etc_dir.join(name);
                bind(&substitute, &target).map_err(|e| {
                    ChildError::namespace_setup(
                        format!("binding {} to {}", substitute.display(), target.display()),
                        e,
                    )
                })?;
            }
        }
    }
    tracing::info!(?strategy, nameservers = dns.len(), "resolver files reconciled");
    Ok(())
}

/// Writes `contents` to `<state_dir>/<name>` and returns its path.
///
/// # Errors
///
/// Returns [`ChildError::Io`] if the file cannot be written.
pub fn write_substitute(state_dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = state_dir.join(name);
    fs::write(&path, contents).map_err(|e| ChildError::Io {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// Replaces `path` with a regular file holding `contents`.
///
/// A copied-up entry may be a symlink into the read-only original; it is
/// removed first so the write cannot reach through it.
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let io_err = |e: io::Error| ChildError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(e)),
    }
    fs::write(path, contents).map_err(io_err)
}

fn read_existing(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ChildError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
