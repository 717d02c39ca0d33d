//! Sequential execution of external configuration commands.
//!
//! Link, address, and route changes are applied with `ip(8)`. Each command
//! runs with its output sent to this process's stderr, so the target
//! command keeps exclusive use of stdout.

use std::io;
use std::process::{Command, Stdio};

use nestling_common::error::CommandFailure;
use thiserror::Error;

/// A command in a sequence failed.
#[derive(Debug, Error)]
#[error("executing {command}")]
pub struct ExecError {
    /// Rendered argument vector of the failing command.
    pub command: String,
    /// Why it failed.
    #[source]
    pub reason: CommandFailure,
}

/// Builds an owned argument vector.
pub fn argv<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

/// Runs each command in order, stopping at the first failure.
///
/// # Errors
///
/// Returns [`ExecError`] naming the first command that could not be
/// started or exited unsuccessfully.
pub fn run_all(commands: &[Vec<String>]) -> Result<(), ExecError> {
    for command in commands {
        let Some((program, args)) = command.split_first() else {
            continue;
        };
        tracing::debug!(cmd = ?command, "executing");
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(io::stderr())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| ExecError {
                command: format!("{command:?}"),
                reason: CommandFailure::Spawn(e),
            })?;
        if !status.success() {
            return Err(ExecError {
                command: format!("{command:?}"),
                reason: CommandFailure::Exit(status),
            });
        }
    }
    Ok(())
}
