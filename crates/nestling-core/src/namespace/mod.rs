//! Network namespace configuration.
//!
//! Brings up loopback and the driver's device, applies addressing and the
//! default route, and reconciles resolver files.

pub mod network;
pub mod tap;
