//! Show command - displays information.

use anyhow::Result;

use crate::checks;
use crate::config::Config;
use crate::indicator::led::Led;

/// Show target for the show command.
pub enum ShowTarget {
    /// Effective configuration after all layers
    Config,
    /// Registered checks and which LED would be driven
    Checks,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Checks => {
            println!("Checks (in run order):");
            for spec in checks::registry(config) {
                println!(
                    "  {:<8} {:<9} timeout {}ms",
                    spec.id,
                    format!("{:?}", spec.severity),
                    spec.timeout.as_millis()
                );
            }
            println!();
            match Led::discover(&config.led_dirs) {
                Some(led) => println!("Status LED: {}", led.dir().display()),
                None => println!("Status LED: none found"),
            }
        }
    }
    Ok(())
}
