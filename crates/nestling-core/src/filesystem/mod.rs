//! Filesystem fix-ups inside the child's mount namespace.
//!
//! Provides the sysfs remount that exposes newly created network devices,
//! `/etc` DNS reconciliation, and the mount helpers both rely on.

pub mod etc;
pub mod mount;
pub mod sysfs;
