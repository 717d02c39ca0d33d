//! # nestling-common
//!
//! Shared error taxonomy, handshake message model, wire framing, and
//! constants used across the nestling workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and does not touch the host: everything here is plain data
//! and byte-level encoding.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod constants;
pub mod error;
pub mod types;
pub mod wire;
