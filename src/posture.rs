//! Posture aggregation.
//!
//! One fixed precedence rule: any critical failure wins, then any warning
//! failure, otherwise healthy. There are no weights or thresholds, so the
//! posture of an attempt can be recomputed from its log alone.

use serde::Serialize;
use std::fmt;

use crate::checks::{CheckResult, DiagnosticReport};

/// Aggregate health classification of one boot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Healthy,
    Degraded,
    Critical,
}

impl Posture {
    /// Derive the posture of a set of results. Order does not matter.
    pub fn of(results: &[CheckResult]) -> Self {
        if results.iter().any(CheckResult::is_critical_failure) {
            Posture::Critical
        } else if results.iter().any(CheckResult::is_warning_failure) {
            Posture::Degraded
        } else {
            Posture::Healthy
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Posture::Healthy => "HEALTHY",
            Posture::Degraded => "DEGRADED",
            Posture::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Posture of a full report.
pub fn aggregate(report: &DiagnosticReport) -> Posture {
    Posture::of(&report.results)
}
