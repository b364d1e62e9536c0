//! Shared helpers.

pub mod sysfs;
