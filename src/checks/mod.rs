//! Boot health checks.
//!
//! The registry is a fixed, ordered list of [`CheckSpec`]s. Each spec names
//! its severity explicitly and carries its own timeout. [`run_all`] runs
//! them one at a time, in order, and turns every outcome (pass, error,
//! panic, timeout) into a [`CheckResult`]; it never aborts the batch.

pub mod cpu;
pub mod memory;
pub mod power;
pub mod storage;
pub mod thermal;
mod types;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::eventlog::EventLog;
use crate::timing::Timer;

pub use types::{CheckResult, Counts, DiagnosticReport, Severity, Verdict};

/// A probe returns a pass message or a failure message.
///
/// Probes do blocking I/O against devices that may be absent or wedged, so
/// they run on the blocking pool and must be shareable across threads.
pub type Probe = Arc<dyn Fn() -> Result<String, String> + Send + Sync>;

/// One registered check.
#[derive(Clone)]
pub struct CheckSpec {
    pub id: &'static str,
    pub severity: Severity,
    pub timeout: Duration,
    pub probe: Probe,
}

impl CheckSpec {
    pub fn new<F>(id: &'static str, severity: Severity, timeout: Duration, probe: F) -> Self
    where
        F: Fn() -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            id,
            severity,
            timeout,
            probe: Arc::new(probe),
        }
    }
}

impl std::fmt::Debug for CheckSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckSpec")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Build the check registry for this device.
///
/// Order: storage, power, cpu, then the supplementary memory and thermal
/// checks when enabled.
pub fn registry(config: &Config) -> Vec<CheckSpec> {
    let timeout = Duration::from_millis(config.check_timeout_ms);

    let mut checks = vec![
        storage::spec(
            config.storage_device.clone(),
            Duration::from_millis(config.storage_timeout_ms),
        ),
        power::spec(config.throttled_path.clone(), timeout),
        cpu::spec(config.cpuinfo_path.clone(), config.cpu_sysfs_dir.clone(), timeout),
    ];

    if config.supplementary_checks {
        checks.push(memory::spec(
            config.meminfo_path.clone(),
            config.min_memory_mib,
            timeout,
        ));
        checks.push(thermal::spec(
            config.thermal_path.clone(),
            config.thermal_limit_millic,
            timeout,
        ));
    }

    checks
}

/// Run every check in registry order.
///
/// Each result is appended to `log` as soon as it is known, so the log
/// order always matches the registry order.
pub async fn run_all(registry: Vec<CheckSpec>, log: &mut EventLog) -> DiagnosticReport {
    let mut report = DiagnosticReport::new();

    eprintln!("Running boot health checks...");
    for spec in registry {
        let result = run_one(spec).await;
        log.check(&result);
        report.push(result);
    }
    eprintln!();

    report
}

/// Run a single check under its timeout.
pub async fn run_one(spec: CheckSpec) -> CheckResult {
    let timer = Timer::start(spec.id);
    let probe = Arc::clone(&spec.probe);
    let task = tokio::task::spawn_blocking(move || probe());

    let result = match tokio::time::timeout(spec.timeout, task).await {
        Ok(Ok(Ok(message))) => CheckResult::pass(spec.id, spec.severity, &message),
        Ok(Ok(Err(message))) => CheckResult::fail(spec.id, spec.severity, &message),
        Ok(Err(e)) => CheckResult::fail(spec.id, spec.severity, &format!("probe crashed: {}", e)),
        // The blocking thread is abandoned; it cannot be interrupted.
        Err(_) => CheckResult::timeout(spec.id, spec.severity, spec.timeout),
    };

    let status = if result.timed_out {
        "TIMEOUT".to_string()
    } else {
        result.tag().to_string()
    };
    timer.finish(&status);
    result
}
