//! TAP network driver.
//!
//! Creates a TAP device in the child's network namespace. The parent
//! attaches its user-mode network stack to the device from outside.

use nestling_common::constants::{DEFAULT_TAP_DEVICE, IP_BINARY};
use nestling_common::error::BoxError;
use nestling_common::types::NetworkConfig;

use crate::driver::NetworkDriver;
use crate::exec::{self, argv};

/// Network driver that creates a named TAP device.
#[derive(Debug, Clone)]
pub struct TapDriver {
    device: String,
}

impl TapDriver {
    /// Creates a driver for the given device name.
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Name of the device this driver creates.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Default for TapDriver {
    fn default() -> Self {
        Self::new(DEFAULT_TAP_DEVICE)
    }
}

impl NetworkDriver for TapDriver {
    fn configure_tap(&self, _config: &NetworkConfig) -> Result<String, BoxError> {
        exec::run_all(&[argv([
            IP_BINARY,
            "tuntap",
            "add",
            "name",
            self.device.as_str(),
            "mode",
            "tap",
        ])])?;
        tracing::debug!(device = %self.device, "tap device created");
        Ok(self.device.clone())
    }
}
