//! bootguard - pre-root hardware health gate.
//!
//! Runs as PID 1 of the initramfs, checks the board before the main root
//! filesystem is touched, and then either hands off to the real init or
//! drops to a recovery shell.

use anyhow::Result;
use clap::{Parser, Subcommand};

use bootguard::commands;
use bootguard::config::Config;

#[derive(Parser)]
#[command(name = "bootguard")]
#[command(about = "Pre-root hardware health gate")]
#[command(
    after_help = "As PID 1 the boot attempt runs unconditionally and arguments are ignored.\n\nQUICK START:\n  bootguard check        Run the health checks on this machine\n  bootguard show config  Print the effective configuration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full boot attempt (checks, indicator, handoff or recovery)
    Init,

    /// Run the health checks only and print the report
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Exit non-zero if the posture is CRITICAL
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show the effective configuration
    Config,
    /// Show the registered checks and the status LED
    Checks,
}

fn main() -> Result<()> {
    // The kernel may pass arguments meant for init; none of them are ours.
    if std::process::id() == 1 {
        commands::cmd_init();
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::cmd_init(),
        Commands::Check { json, strict } => {
            let config = Config::load();
            commands::cmd_check(&config, json, strict)?;
        }
        Commands::Show { what } => {
            let config = Config::load();
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Checks => commands::show::ShowTarget::Checks,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
