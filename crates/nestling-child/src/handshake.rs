//! Staged handshake with the parent process.
//!
//! The parent passes a descriptor number through an environment variable
//! and writes one framed message per stage. Stage 0 arrives before the
//! child holds its capabilities in the new user namespace: the child
//! re-executes itself (same PID, argv, and environment) and reads the
//! stage-1 message from the same descriptor in the new image.

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::mem::ManuallyDrop;
use std::os::fd::{FromRawFd, IntoRawFd, RawFd};
use std::os::unix::ffi::OsStringExt;

use nestling_common::constants::SELF_EXE;
use nestling_common::error::{ChildError, Result};
use nestling_common::types::{HandshakeMessage, Stage};
use nestling_common::wire;

/// Outcome of reading the handshake for this process image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Stage 0: the process must re-execute itself.
    Bootstrap,
    /// Stage 1: the authoritative message.
    Configured(HandshakeMessage),
}

/// Reads this image's handshake message from the descriptor named by
/// `env_key`.
///
/// On stage 0 the descriptor stays open and the variable stays set, so the
/// re-executed image can read the next message. On stage 1 the variable is
/// unset and the descriptor closed before the state directory is checked.
///
/// # Errors
///
/// - [`ChildError::Config`] if `env_key` is empty or unset, its value is
///   not a descriptor number, the descriptor is not open, or the stage-1
///   message has an empty state directory.
/// - [`ChildError::Protocol`] if the message is malformed or carries a
///   stage other than 0 or 1.
pub fn receive(env_key: &str) -> Result<Handshake> {
    if env_key.is_empty() {
        return Err(ChildError::config("pipe FD env key is not set"));
    }
    let value = std::env::var(env_key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ChildError::config(format!("{env_key} is not set")))?;
    let fd: RawFd = value.trim().parse().map_err(|e| ChildError::Config {
        message: format!("unexpected fd value: {value}"),
        source: Some(Box::new(e)),
    })?;
    ensure_open(fd)?;

    // SAFETY: `fd` is open and was handed to this process for the
    // handshake. `ManuallyDrop` keeps it open for a stage-0 re-exec.
    let pipe = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
    let msg = wire::read_message(&mut &*pipe).map_err(|e| ChildError::Protocol {
        message: format!("parsing message from fd {fd}"),
        source: Some(Box::new(e)),
    })?;
    let stage = msg.stage()?;
    tracing::debug!(fd, %stage, ?msg, "received handshake message");

    match stage {
        Stage::Bootstrap => Ok(Handshake::Bootstrap),
        Stage::Configured => {
            // SAFETY: the child is single-threaded until setup finishes and
            // the async runtime is built.
            unsafe { std::env::remove_var(env_key) };
            close(ManuallyDrop::into_inner(pipe).into_raw_fd())?;
            if msg.state_dir.as_os_str().is_empty() {
                return Err(ChildError::config("got empty StateDir"));
            }
            Ok(Handshake::Configured(msg))
        }
    }
}

/// Replaces the process image with `/proc/self/exe`, keeping argv and the
/// environment.
///
/// Only returns if `execve(2)` fails.
pub fn reexec() -> ChildError {
    tracing::debug!("re-executing to acquire capabilities");
    match exec_self() {
        Ok(never) => match never {},
        Err(e) => ChildError::Reexec { source: e },
    }
}

fn exec_self() -> io::Result<std::convert::Infallible> {
    let path = CString::new(SELF_EXE)?;
    let args = std::env::args_os()
        .map(|arg| CString::new(arg.into_vec()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let env = std::env::vars_os()
        .map(|(key, value)| {
            let mut pair = key.into_vec();
            pair.push(b'=');
            pair.extend(value.into_vec());
            CString::new(pair)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    nix::unistd::execve(&path, &args, &env).map_err(io::Error::from)
}

fn ensure_open(fd: RawFd) -> Result<()> {
    // SAFETY: F_GETFD only inspects the descriptor table.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(ChildError::Config {
            message: format!("fd {fd} is not open"),
            source: Some(Box::new(io::Error::last_os_error())),
        });
    }
    Ok(())
}

fn close(fd: RawFd) -> Result<()> {
    // SAFETY: ownership of `fd` was taken from the `File` above.
    if unsafe { libc::close(fd) } == -1 {
        return Err(ChildError::Config {
            message: format!("failed to close fd {fd}"),
            source: Some(Box::new(io::Error::last_os_error())),
        });
    }
    Ok(())
}
