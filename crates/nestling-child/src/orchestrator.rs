//! Child bootstrap entry point.
//!
//! Sequence: handshake, copy-up, network setup, then the target command
//! with the port driver around it. Setup runs synchronously on the main
//! thread; the async runtime is only built to launch the command.

use nestling_common::error::{ChildError, CommandFailure, Result};
use nestling_core::copyup;
use nestling_core::namespace::network::{self, NetworkSetup};

use crate::handshake::{self, Handshake};
use crate::options::ChildOptions;
use crate::{launcher, port};

/// Runs the child bootstrap to completion.
///
/// On a stage-0 handshake the process image is replaced and this function
/// does not return unless `execve(2)` fails.
///
/// # Errors
///
/// Returns the first failure of the sequence. When the target command
/// exits unsuccessfully, [`ChildError::exit_code`] gives its exit code.
pub fn run(opts: &ChildOptions) -> Result<()> {
    run_with(opts, handshake::reexec)
}

pub(crate) fn run_with(opts: &ChildOptions, reexec: impl FnOnce() -> ChildError) -> Result<()> {
    opts.validate()?;
    let msg = match handshake::receive(opts.pipe_env_key())? {
        Handshake::Bootstrap => return Err(reexec()),
        Handshake::Configured(msg) => msg,
    };
    tracing::info!(state_dir = %msg.state_dir.display(), "handshake complete");

    let etc_copied = copyup::setup_copy_dirs(opts.copy_up_driver(), opts.copy_up_dirs())?;
    match network::setup_network(&msg, etc_copied, opts.network_driver())? {
        NetworkSetup::HostNetwork => tracing::info!("using host network"),
        NetworkSetup::Configured { device, sysfs, dns } => {
            tracing::info!(%device, %sysfs, ?dns, "network namespace configured");
        }
    }

    // The parent-death signal is tied to the thread that spawns the command.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ChildError::Command {
            command: format!("{:?}", opts.target_command()),
            reason: CommandFailure::Spawn(e),
        })?;
    runtime.block_on(port::supervise(
        opts.port_driver().cloned(),
        msg.port,
        launcher::run(opts.target_command()),
    ))
}
