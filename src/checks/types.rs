//! Check result types and the per-attempt diagnostic report.

use serde::Serialize;
use std::time::Duration;

/// How much a failing check matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A failure blocks the handoff.
    Critical,
    /// A failure is reported but boot still proceeds.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Result of a single hardware check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub id: String,
    pub severity: Severity,
    pub verdict: Verdict,
    pub message: String,
    /// The probe never answered. Always paired with `Verdict::Fail`.
    pub timed_out: bool,
}

impl CheckResult {
    pub fn pass(id: &str, severity: Severity, message: &str) -> Self {
        Self {
            id: id.to_string(),
            severity,
            verdict: Verdict::Pass,
            message: message.to_string(),
            timed_out: false,
        }
    }

    pub fn fail(id: &str, severity: Severity, message: &str) -> Self {
        Self {
            id: id.to_string(),
            severity,
            verdict: Verdict::Fail,
            message: message.to_string(),
            timed_out: false,
        }
    }

    pub fn timeout(id: &str, severity: Severity, limit: Duration) -> Self {
        Self {
            id: id.to_string(),
            severity,
            verdict: Verdict::Fail,
            message: format!("TIMEOUT after {}ms (no response from probe)", limit.as_millis()),
            timed_out: true,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Critical-severity failure.
    pub fn is_critical_failure(&self) -> bool {
        self.verdict == Verdict::Fail && self.severity == Severity::Critical
    }

    /// Warning-severity failure.
    pub fn is_warning_failure(&self) -> bool {
        self.verdict == Verdict::Fail && self.severity == Severity::Warning
    }

    /// Log tag for this result: `OK`, `WARN` or `FAIL`.
    pub fn tag(&self) -> &'static str {
        match (self.verdict, self.severity) {
            (Verdict::Pass, _) => "OK",
            (Verdict::Fail, Severity::Warning) => "WARN",
            (Verdict::Fail, Severity::Critical) => "FAIL",
        }
    }
}

/// Tallies derived from a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub passed: usize,
    /// Warning-severity failures.
    pub warned: usize,
    /// Critical-severity failures.
    pub failed: usize,
}

/// Results of one boot attempt's checks, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticReport {
    pub results: Vec<CheckResult>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for result in &self.results {
            if result.passed() {
                counts.passed += 1;
            } else if result.is_critical_failure() {
                counts.failed += 1;
            } else {
                counts.warned += 1;
            }
        }
        counts
    }

    /// Results that did not pass, in execution order.
    pub fn problems(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== Boot Health Check Results ===\n");

        for result in &self.results {
            let icon = match result.tag() {
                "OK" => "✓",
                "WARN" => "⚠",
                _ => "✗",
            };
            println!("  {} [{}] {}: {}", icon, result.tag(), result.id, result.message);
        }

        let counts = self.counts();
        println!();
        println!("Summary: {}/{} passed", counts.passed, self.results.len());
        if counts.failed > 0 {
            println!("         {} critical failure(s) - boot will be refused", counts.failed);
        }
        if counts.warned > 0 {
            println!("         {} warning(s)", counts.warned);
        }
    }
}
