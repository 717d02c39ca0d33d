//! Port driver lifecycle around the target command.
//!
//! The driver starts before the command runs and is stopped once the
//! command exits, whatever the outcome. Its shutdown result is awaited
//! before the child reports completion.

use std::future::Future;
use std::sync::Arc;

use nestling_common::error::{BoxError, ChildError, Result};
use nestling_common::types::PortConfig;
use nestling_core::driver::{self, PortDriver, StopTrigger};
use tokio::task::JoinHandle;

/// A running port driver.
#[derive(Debug)]
pub struct PortSupervisor {
    trigger: StopTrigger,
    task: JoinHandle<std::result::Result<(), BoxError>>,
}

impl PortSupervisor {
    /// Starts `driver` with `payload` on the current runtime.
    pub fn start(driver: Arc<dyn PortDriver>, payload: PortConfig) -> Self {
        let (trigger, signal) = driver::stop_channel();
        let task = tokio::spawn(driver.run(payload, signal));
        tracing::debug!("port driver started");
        Self { trigger, task }
    }

    /// Signals the driver to stop and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::Driver`] if the driver reported a failure or
    /// its task panicked.
    pub async fn shutdown(self) -> Result<()> {
        if !self.trigger.fire() {
            tracing::debug!("port driver finished before stop was requested");
        }
        match self.task.await {
            Ok(Ok(())) => {
                tracing::debug!("port driver stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(ChildError::driver("port", e)),
            Err(join) => Err(ChildError::driver("port", join)),
        }
    }
}

/// Runs `command` with the optional port driver alongside it.
///
/// Without a driver the command's result is returned as is. With one, the
/// driver is stopped after the command exits and its outcome is awaited.
/// A command failure takes precedence over a port failure, which is then
/// only logged.
///
/// # Errors
///
/// Returns the command's error, or [`ChildError::Driver`] if the command
/// succeeded and the driver failed.
pub async fn supervise<F>(
    driver: Option<Arc<dyn PortDriver>>,
    payload: PortConfig,
    command: F,
) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let Some(driver) = driver else {
        return command.await;
    };
    let supervisor = PortSupervisor::start(driver, payload);
    let outcome = command.await;
    let port = supervisor.shutdown().await;
    match (outcome, port) {
        (Err(command), Err(port)) => {
            tracing::warn!(error = %port, "port driver failed after command failure");
            Err(command)
        }
        (Err(command), Ok(())) => Err(command),
        (Ok(()), port) => port,
    }
}
