//! Init command - the boot attempt.
//!
//! Runs as PID 1 of the initramfs. Never returns: it either becomes the
//! main system's init via `switch_root` or becomes the recovery shell.

use anyhow::Result;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::runtime;
use crate::checks;
use crate::config::Config;
use crate::error::RecoveryReason;
use crate::eventlog::EventLog;
use crate::handoff::{HandoffTarget, PseudoMounts, SystemPlatform};
use crate::indicator::display::Display;
use crate::indicator::led::Led;
use crate::indicator::Signaler;
use crate::orchestrator::{Attempt, BootOutcome, Orchestrator};
use crate::process;
use crate::recovery;

/// Execute the init command.
pub fn cmd_init() -> ! {
    // The kernel passes no PATH; mount helpers live in /sbin.
    process::ensure_path();
    // /proc must be up before the config reads the kernel command line.
    let pseudo = PseudoMounts::setup();
    let config = Config::load();

    let reason = match panic::catch_unwind(AssertUnwindSafe(|| attempt(&config, pseudo))) {
        // Reaching here means the handoff did not replace this process; the
        // attempt already logged why and wrote the terminal line.
        Ok(Ok(attempt)) => attempt.reason.unwrap_or_else(|| {
            RecoveryReason::TransferFailed("switch_root returned".to_string())
        }),
        Ok(Err(e)) => contain(&config, RecoveryReason::InternalFault(format!("{:#}", e))),
        Err(payload) => contain(
            &config,
            RecoveryReason::InternalFault(format!("panic: {}", panic_message(payload.as_ref()))),
        ),
    };

    recovery::enter_shell(&config.recovery_shell, &reason.to_string())
}

fn attempt(config: &Config, pseudo: PseudoMounts) -> Result<Attempt> {
    let runtime = runtime()?;
    let mut log = EventLog::from_config(config);
    log.info("bootguard", &format!("boot attempt, root={}", config.root_device));

    let signaler = Signaler::new(Led::discover(&config.led_dirs), Display::from_config(config));
    let mut platform = SystemPlatform::new(pseudo);
    let orchestrator = Orchestrator {
        signaler: &signaler,
        platform: &mut platform,
        target: HandoffTarget::from_config(config),
        policy: config.degraded_policy,
    };

    let attempt = runtime.block_on(orchestrator.run(checks::registry(config), &mut log));
    // Timed-out probes keep their blocking threads; don't wait for them.
    runtime.shutdown_background();
    Ok(attempt)
}

/// Record a fault that escaped the attempt. The attempt's own log handle is
/// gone, so the sinks are reopened in append mode.
fn contain(config: &Config, reason: RecoveryReason) -> RecoveryReason {
    let mut log = EventLog::from_config(config);
    log.failure("bootguard", &reason.to_string());
    log.terminal(BootOutcome::RecoveryShell);
    reason
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
