//! Pluggable driver capabilities.
//!
//! Each driver is a single-responsibility trait object injected through the
//! child options. Drivers report failures as boxed errors; the caller wraps
//! them in [`nestling_common::error::ChildError::Driver`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use nestling_common::error::BoxError;
use nestling_common::types::{NetworkConfig, PortConfig};
use tokio::sync::oneshot;

/// Creates the device that bridges the namespace to the outside network.
pub trait NetworkDriver: Send + Sync {
    /// Configures a device for `config` and returns its name.
    ///
    /// # Errors
    ///
    /// Returns a driver-specific error if the device cannot be created.
    fn configure_tap(&self, config: &NetworkConfig) -> Result<String, BoxError>;
}

/// Makes directories of the new root writable by copying them up.
pub trait CopyUpDriver: Send + Sync {
    /// Copies up `dirs` and returns the ones that were actually copied.
    ///
    /// # Errors
    ///
    /// Returns a driver-specific error if a directory cannot be copied.
    fn copy_up(&self, dirs: &[PathBuf]) -> Result<Vec<PathBuf>, BoxError>;
}

/// Future returned by [`PortDriver::run`].
pub type PortFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

/// Forwards ports for the lifetime of the target command.
pub trait PortDriver: Send + Sync {
    /// Runs until `stop` fires, then returns the shutdown outcome.
    fn run(&self, payload: PortConfig, stop: StopSignal) -> PortFuture;
}

/// Receiving half of the one-shot stop signal handed to a port driver.
#[derive(Debug)]
pub struct StopSignal(oneshot::Receiver<()>);

/// Sending half of the stop signal, held by the lifecycle coordinator.
#[derive(Debug)]
pub struct StopTrigger(oneshot::Sender<()>);

/// Creates a connected stop trigger and signal.
#[must_use]
pub fn stop_channel() -> (StopTrigger, StopSignal) {
    let (tx, rx) = oneshot::channel();
    (StopTrigger(tx), StopSignal(rx))
}

impl StopSignal {
    /// Resolves once the trigger fires or is dropped.
    pub async fn stopped(self) {
        let _ = self.0.await;
    }
}

impl StopTrigger {
    /// Fires the stop signal.
    ///
    /// Returns `false` if the driver already dropped its signal.
    pub fn fire(self) -> bool {
        self.0.send(()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_resolves_after_fire() {
        let (trigger, signal) = stop_channel();
        let waiter = tokio::spawn(signal.stopped());
        assert!(trigger.fire());
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn signal_resolves_when_trigger_dropped() {
        let (trigger, signal) = stop_channel();
        drop(trigger);
        signal.stopped().await;
    }

    #[test]
    fn fire_reports_dropped_signal() {
        let (trigger, signal) = stop_channel();
        drop(signal);
        assert!(!trigger.fire());
    }
}
