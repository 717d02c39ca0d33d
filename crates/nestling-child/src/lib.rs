//! Child-side bootstrap for rootless namespace sandboxes.
//!
//! Runs inside freshly created user, mount, network, and PID namespaces:
//! completes the staged handshake with the parent, copies up directories,
//! configures the network namespace, and runs the target command alongside
//! an optional port driver.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod handshake;
pub mod launcher;
pub mod options;
pub mod orchestrator;
pub mod port;

pub use options::ChildOptions;
pub use orchestrator::run;
