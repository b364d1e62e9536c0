//! Check command - runs the health checks without handing off.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::time::Duration;

use super::runtime;
use crate::checks::{self, CheckResult, Counts};
use crate::config::Config;
use crate::eventlog::EventLog;
use crate::posture::{self, Posture};

/// How long to wait for abandoned probe threads on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

#[derive(Serialize)]
struct JsonReport<'a> {
    posture: Posture,
    counts: Counts,
    results: &'a [CheckResult],
}

/// Execute the check command.
pub fn cmd_check(config: &Config, json: bool, strict: bool) -> Result<()> {
    let runtime = runtime()?;
    let mut log = EventLog::new();
    let report = runtime.block_on(checks::run_all(checks::registry(config), &mut log));
    // A timed-out probe still holds a blocking thread; don't wait on it.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    let posture = posture::aggregate(&report);

    if json {
        let out = JsonReport {
            posture,
            counts: report.counts(),
            results: &report.results,
        };
        let text = serde_json::to_string_pretty(&out).context("Failed to serialize report")?;
        println!("{}", text);
    } else {
        report.print();
        println!();
        println!("Posture: {}", posture);
    }

    if strict && posture == Posture::Critical {
        bail!("Boot health checks failed: posture is {}", posture);
    }
    Ok(())
}
