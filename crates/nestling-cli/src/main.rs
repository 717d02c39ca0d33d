//! # nestling-child
//!
//! Child side of a rootless namespace sandbox. Started by the parent inside
//! fresh namespaces, it completes the handshake, prepares the namespaces,
//! and runs the target command, exiting with the command's own code.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match nestling_child::run(&cli.into_options()) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match err.exit_code() {
            Some(code) => {
                tracing::debug!(code, "target command failed");
                Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
            }
            None => Err(err).context("child bootstrap failed"),
        },
    }
}
