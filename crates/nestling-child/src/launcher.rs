//! Target command launcher.
//!
//! The command inherits this process's standard streams and receives
//! `SIGKILL` if the thread that spawned it exits first.

use std::process::{Command, Stdio};

use nestling_common::error::{ChildError, CommandFailure, Result};

/// Builds the command for `target` without starting it.
///
/// # Errors
///
/// Returns [`ChildError::Config`] if `target` is empty.
pub fn create_command(target: &[String]) -> Result<Command> {
    let (program, args) = target
        .split_first()
        .ok_or_else(|| ChildError::config("target command is empty"))?;
    let mut cmd = Command::new(program);
    let _ = cmd
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    #[cfg(target_os = "linux")]
    {
        use std::os::unix::process::CommandExt;

        use nix::sys::prctl;
        use nix::sys::signal::Signal;

        // SAFETY: prctl(2) is async-signal-safe and the closure touches no
        // shared state between fork and exec.
        let _ = unsafe {
            cmd.pre_exec(|| prctl::set_pdeathsig(Signal::SIGKILL).map_err(std::io::Error::from))
        };
    }
    Ok(cmd)
}

/// Runs `target` to completion.
///
/// # Errors
///
/// Returns [`ChildError::Config`] for an empty command and
/// [`ChildError::Command`] if it cannot be started, cannot be waited on,
/// or exits unsuccessfully.
pub async fn run(target: &[String]) -> Result<()> {
    let command = format!("{target:?}");
    let failed = |reason| ChildError::Command {
        command: command.clone(),
        reason,
    };

    let mut child = tokio::process::Command::from(create_command(target)?)
        .spawn()
        .map_err(|e| failed(CommandFailure::Spawn(e)))?;
    tracing::info!(cmd = %command, pid = child.id(), "target command started");

    let status = child
        .wait()
        .await
        .map_err(|e| failed(CommandFailure::Wait(e)))?;
    tracing::info!(cmd = %command, %status, "target command exited");
    if status.success() {
        Ok(())
    } else {
        Err(failed(CommandFailure::Exit(status)))
    }
}
