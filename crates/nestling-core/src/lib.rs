//! # nestling-core
//!
//! Namespace setup primitives for the nestling child process.
//!
//! This crate provides:
//! - **Drivers**: capability traits for network, copy-up, and port drivers.
//! - **Filesystem**: the sysfs remount, `/etc` DNS reconciliation, and mount
//!   helpers.
//! - **Namespace**: network namespace configuration and the TAP driver.
//! - **Copy-up**: the copy-up coordinator and the tmpfs+symlink driver.
//!
//! All mount system calls go through `nix` and are confined to
//! [`filesystem::mount`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod copyup;
pub mod driver;
pub mod exec;
pub mod filesystem;
pub mod namespace;
