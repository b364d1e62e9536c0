//! CLI command handlers.
//!
//! - `init` - Full boot attempt (also what runs as PID 1)
//! - `check` - Run the health checks only and print the report
//! - `show` - Display information

pub mod check;
pub mod init;
pub mod show;

pub use check::cmd_check;
pub use init::cmd_init;
pub use show::cmd_show;

use anyhow::{Context, Result};
use tokio::runtime::{Builder, Runtime};

/// Single-threaded runtime; checks run one at a time and the probing blink
/// is the only other task.
pub fn runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
