//! Unified error taxonomy for the nestling workspace.
//!
//! Every fallible operation of the child bootstrap returns [`ChildError`].
//! The variants mirror the failure classes the parent process distinguishes:
//! bad configuration, a broken handshake, namespace mutation failures,
//! driver failures, and the target command itself failing.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Boxed error used to carry driver- and command-specific causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type of the child bootstrap.
#[derive(Debug, Error)]
pub enum ChildError {
    /// A required option is missing or invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The handshake message could not be decoded or carried an
    /// unexpected stage.
    #[error("handshake protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// A mount or device configuration step that is not individually
    /// tolerated failed.
    #[error("namespace setup failed: {message}")]
    NamespaceSetup {
        /// The step that failed.
        message: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// A network, copy-up, or port driver reported a failure.
    #[error("{driver} driver failed")]
    Driver {
        /// Which driver capability failed.
        driver: &'static str,
        /// Error returned by the driver.
        #[source]
        source: BoxError,
    },

    /// The target command could not be started or did not succeed.
    #[error("command {command} failed")]
    Command {
        /// Rendered command vector.
        command: String,
        /// Why the command failed.
        #[source]
        reason: CommandFailure,
    },

    /// A file under `/etc` or the state directory could not be written.
    #[error("I/O error at {path}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Replacing the process image for the second handshake stage failed.
    #[error("re-executing the current process image failed")]
    Reexec {
        /// Error returned by `execve(2)`.
        source: std::io::Error,
    },
}

/// Cause attached to [`ChildError::Command`].
#[derive(Debug, Error)]
pub enum CommandFailure {
    /// The process could not be spawned.
    #[error("failed to start")]
    Spawn(#[source] std::io::Error),
    /// Waiting for the process failed.
    #[error("failed to wait for exit")]
    Wait(#[source] std::io::Error),
    /// The process ran but exited unsuccessfully.
    #[error("exited with {0}")]
    Exit(ExitStatus),
}

impl ChildError {
    /// Creates a [`ChildError::Config`] without an underlying cause.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ChildError::Protocol`] without an underlying cause.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ChildError::NamespaceSetup`] wrapping `source`.
    pub fn namespace_setup(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::NamespaceSetup {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Creates a [`ChildError::Driver`] for the named capability.
    pub fn driver(driver: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Driver {
            driver,
            source: source.into(),
        }
    }

    /// Exit code to propagate when the target command itself failed.
    ///
    /// Returns the command's exit code, or `128 + signal` when it was
    /// killed by a signal. Returns `None` for every other failure.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        use std::os::unix::process::ExitStatusExt;

        match self {
            Self::Command {
                reason: CommandFailure::Exit(status),
                ..
            } => status
                .code()
                .or_else(|| status.signal().map(|sig| 128 + sig)),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ChildError>;
