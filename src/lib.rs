//! bootguard library exports.
//!
//! The binary is a thin CLI over these modules; integration tests drive
//! the orchestrator through them with a fake [`handoff::Platform`].

pub mod checks;
pub mod commands;
pub mod common;
pub mod config;
pub mod error;
pub mod eventlog;
pub mod handoff;
pub mod indicator;
pub mod orchestrator;
pub mod posture;
pub mod process;
pub mod recovery;
pub mod timing;
