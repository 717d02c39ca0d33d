//! Process-wide configuration of the child bootstrap.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use nestling_common::error::{ChildError, Result};
use nestling_core::driver::{CopyUpDriver, NetworkDriver, PortDriver};

/// Options supplied once at startup and held for the lifetime of the child.
///
/// Drivers left unset select the corresponding default behavior: no
/// network driver shares the host network, no copy-up driver forbids
/// copy-up directories, and no port driver runs the command alone.
pub struct ChildOptions {
    pipe_env_key: String,
    target_command: Vec<String>,
    network_driver: Option<Box<dyn NetworkDriver>>,
    copy_up_driver: Option<Box<dyn CopyUpDriver>>,
    copy_up_dirs: Vec<PathBuf>,
    port_driver: Option<Arc<dyn PortDriver>>,
}

impl ChildOptions {
    /// Creates options for the handshake variable `pipe_env_key` and the
    /// command to run.
    #[must_use]
    pub fn new(pipe_env_key: impl Into<String>, target_command: Vec<String>) -> Self {
        Self {
            pipe_env_key: pipe_env_key.into(),
            target_command,
            network_driver: None,
            copy_up_driver: None,
            copy_up_dirs: Vec::new(),
            port_driver: None,
        }
    }

    /// Sets the network driver.
    #[must_use]
    pub fn with_network_driver(mut self, driver: impl NetworkDriver + 'static) -> Self {
        self.network_driver = Some(Box::new(driver));
        self
    }

    /// Sets the copy-up driver.
    #[must_use]
    pub fn with_copy_up_driver(mut self, driver: impl CopyUpDriver + 'static) -> Self {
        self.copy_up_driver = Some(Box::new(driver));
        self
    }

    /// Sets the directories to copy up.
    #[must_use]
    pub fn with_copy_up_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.copy_up_dirs = dirs;
        self
    }

    /// Sets the port driver.
    #[must_use]
    pub fn with_port_driver(mut self, driver: Arc<dyn PortDriver>) -> Self {
        self.port_driver = Some(driver);
        self
    }

    /// Environment variable holding the handshake descriptor.
    pub fn pipe_env_key(&self) -> &str {
        &self.pipe_env_key
    }

    /// Command executed once setup completes.
    pub fn target_command(&self) -> &[String] {
        &self.target_command
    }

    /// Configured network driver, if any.
    pub fn network_driver(&self) -> Option<&dyn NetworkDriver> {
        self.network_driver.as_deref()
    }

    /// Configured copy-up driver, if any.
    pub fn copy_up_driver(&self) -> Option<&dyn CopyUpDriver> {
        self.copy_up_driver.as_deref()
    }

    /// Directories to copy up.
    pub fn copy_up_dirs(&self) -> &[PathBuf] {
        &self.copy_up_dirs
    }

    /// Configured port driver, if any.
    pub fn port_driver(&self) -> Option<&Arc<dyn PortDriver>> {
        self.port_driver.as_ref()
    }

    /// Checks the required options.
    ///
    /// # Errors
    ///
    /// Returns [`ChildError::Config`] if the handshake variable name or the
    /// target command is empty.
    pub fn validate(&self) -> Result<()> {
        if self.pipe_env_key.is_empty() {
            return Err(ChildError::config("pipe FD env key is not set"));
        }
        if self.target_command.is_empty() {
            return Err(ChildError::config("target command is empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for ChildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildOptions")
            .field("pipe_env_key", &self.pipe_env_key)
            .field("target_command", &self.target_command)
            .field("network_driver", &self.network_driver.is_some())
            .field("copy_up_driver", &self.copy_up_driver.is_some())
            .field("copy_up_dirs", &self.copy_up_dirs)
            .field("port_driver", &self.port_driver.is_some())
            .finish()
    }
}
