//! Command-line definition and mapping onto [`ChildOptions`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use nestling_child::ChildOptions;
use nestling_common::constants::{BIN_NAME, DEFAULT_PIPE_ENV_KEY, DEFAULT_TAP_DEVICE};
use nestling_core::copyup::tmpfs_symlink::TmpfsSymlinkDriver;
use nestling_core::namespace::tap::TapDriver;

/// Child side of a rootless namespace sandbox.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Environment variable holding the handshake descriptor.
    #[arg(long, env = "NESTLING_PIPE_ENV_KEY", default_value = DEFAULT_PIPE_ENV_KEY)]
    pub pipe_env_key: String,

    /// Network mode.
    #[arg(long, value_enum, default_value_t = NetMode::Host)]
    pub net: NetMode,

    /// TAP device created in `tap` mode.
    #[arg(long, default_value = DEFAULT_TAP_DEVICE)]
    pub tap_device: String,

    /// Directory to copy up (repeatable).
    #[arg(long = "copy-up", value_name = "DIR")]
    pub copy_up: Vec<PathBuf>,

    /// Copy-up mechanism.
    #[arg(long, value_enum)]
    pub copy_up_mode: Option<CopyUpMode>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long)]
    pub debug: bool,

    /// Command to run once the namespaces are set up.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Network modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetMode {
    /// Share the host network namespace.
    Host,
    /// Create a TAP device inside a new network namespace.
    Tap,
}

/// Copy-up mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CopyUpMode {
    /// tmpfs holding symlinks into the original tree.
    #[value(name = "tmpfs+symlink")]
    TmpfsSymlink,
}

impl Cli {
    /// Builds the child options selected on the command line.
    pub fn into_options(self) -> ChildOptions {
        let mut opts = ChildOptions::new(self.pipe_env_key, self.command)
            .with_copy_up_dirs(self.copy_up);
        if self.net == NetMode::Tap {
            opts = opts.with_network_driver(TapDriver::new(self.tap_device));
        }
        if let Some(CopyUpMode::TmpfsSymlink) = self.copy_up_mode {
            opts = opts.with_copy_up_driver(TmpfsSymlinkDriver);
        }
        opts
    }
}
