//! One boot attempt: checks, verdict, indicator, then handoff or recovery.
//!
//! There is exactly one attempt per boot and no retry. Whatever goes wrong
//! ends in [`BootOutcome::RecoveryShell`] with a reason in the log.

use crate::checks::{self, CheckSpec, DiagnosticReport};
use crate::config::DegradedPolicy;
use crate::error::RecoveryReason;
use crate::eventlog::EventLog;
use crate::handoff::{HandoffExecutor, HandoffOutcome, HandoffTarget, Platform};
use crate::indicator::{IndicatorPattern, Signaler};
use crate::posture::{self, Posture};

/// Terminal outcome of a boot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    HandedOff,
    RecoveryShell,
}

impl BootOutcome {
    /// Last line of the event log.
    pub fn marker(self) -> &'static str {
        match self {
            BootOutcome::HandedOff => "HANDED_OFF",
            BootOutcome::RecoveryShell => "RECOVERY_SHELL",
        }
    }
}

/// Everything an attempt decided, for the caller and for tests.
#[derive(Debug)]
pub struct Attempt {
    pub report: DiagnosticReport,
    pub posture: Posture,
    pub pattern: IndicatorPattern,
    pub handoff_attempted: bool,
    pub outcome: BootOutcome,
    pub reason: Option<RecoveryReason>,
}

/// Whether a posture may proceed to handoff.
pub fn decide(posture: Posture, policy: DegradedPolicy) -> Result<(), RecoveryReason> {
    match (posture, policy) {
        (Posture::Critical, _) => Err(RecoveryReason::PostureCritical),
        (Posture::Degraded, DegradedPolicy::Block) => Err(RecoveryReason::DegradedBlocked),
        _ => Ok(()),
    }
}

/// Runs a single boot attempt against `platform`.
pub struct Orchestrator<'a, P: Platform> {
    pub signaler: &'a Signaler,
    pub platform: &'a mut P,
    pub target: HandoffTarget,
    pub policy: DegradedPolicy,
}

impl<'a, P: Platform> Orchestrator<'a, P> {
    pub async fn run(self, registry: Vec<CheckSpec>, log: &mut EventLog) -> Attempt {
        let probing = self.signaler.start_probing();
        let report = checks::run_all(registry, log).await;
        if let Some(probing) = probing {
            probing.stop();
        }

        let posture = posture::aggregate(&report);
        log.summary(report.counts(), posture);

        let pattern = self.signaler.signal(posture, &report, log).await;

        let (handoff_attempted, reason) = match decide(posture, self.policy) {
            Err(reason) => {
                log.failure("handoff", &reason.to_string());
                (false, Some(reason))
            }
            Ok(()) => {
                if posture == Posture::Degraded {
                    log.info("handoff", "posture DEGRADED, proceeding with warnings");
                }
                let mut executor = HandoffExecutor::new(self.platform, self.target);
                match executor.execute(log) {
                    HandoffOutcome::Transferred => (true, None),
                    HandoffOutcome::RecoveryNeeded(reason) => (true, Some(reason)),
                }
            }
        };

        let outcome = match &reason {
            None => BootOutcome::HandedOff,
            Some(reason) => {
                self.signaler
                    .display()
                    .show_notice(&format!("recovery shell ({})", reason));
                log.terminal(BootOutcome::RecoveryShell);
                BootOutcome::RecoveryShell
            }
        };

        Attempt {
            report,
            posture,
            pattern,
            handoff_attempted,
            outcome,
            reason,
        }
    }
}
