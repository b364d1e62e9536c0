//! Posture indicator.
//!
//! Two independent outputs: the board's activity LED and a text banner on
//! the console (and the framebuffer console when one exists). Neither is
//! required for a correct boot; a missing LED is noted once and skipped.

pub mod display;
pub mod led;

use crate::checks::DiagnosticReport;
use crate::eventlog::EventLog;
use crate::posture::Posture;

pub use display::Display;
pub use led::{Led, ProbeBlink};

/// LED pattern shown for a posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPattern {
    /// Double pulse, then held on.
    SuccessPattern,
    /// Slow on/off cycle.
    WarningPattern,
    /// Fast on/off cycle.
    FailurePattern,
}

/// One timed LED state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub on: bool,
    pub ms: u64,
}

/// What the LED keeps doing after the preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steady {
    On,
    Blink { on_ms: u64, off_ms: u64 },
}

const DOUBLE_PULSE: &[Step] = &[
    Step { on: true, ms: 150 },
    Step { on: false, ms: 150 },
    Step { on: true, ms: 150 },
    Step { on: false, ms: 150 },
];

impl IndicatorPattern {
    pub fn for_posture(posture: Posture) -> Self {
        match posture {
            Posture::Healthy => IndicatorPattern::SuccessPattern,
            Posture::Degraded => IndicatorPattern::WarningPattern,
            Posture::Critical => IndicatorPattern::FailurePattern,
        }
    }

    pub fn preamble(self) -> &'static [Step] {
        match self {
            IndicatorPattern::SuccessPattern => DOUBLE_PULSE,
            IndicatorPattern::WarningPattern | IndicatorPattern::FailurePattern => &[],
        }
    }

    pub fn steady(self) -> Steady {
        match self {
            IndicatorPattern::SuccessPattern => Steady::On,
            IndicatorPattern::WarningPattern => Steady::Blink {
                on_ms: 1000,
                off_ms: 1000,
            },
            IndicatorPattern::FailurePattern => Steady::Blink {
                on_ms: 100,
                off_ms: 100,
            },
        }
    }
}

/// Drives the LED and the text banner.
pub struct Signaler {
    led: Option<Led>,
    display: Display,
}

impl Signaler {
    pub fn new(led: Option<Led>, display: Display) -> Self {
        Self { led, display }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Start the "checks in progress" pattern, if there is an LED.
    pub fn start_probing(&self) -> Option<ProbeBlink> {
        self.led.as_ref().map(Led::start_probing)
    }

    /// Show the final posture. Returns the pattern that was selected even
    /// when no LED is present.
    pub async fn signal(
        &self,
        posture: Posture,
        report: &DiagnosticReport,
        log: &mut EventLog,
    ) -> IndicatorPattern {
        let pattern = IndicatorPattern::for_posture(posture);

        match &self.led {
            Some(led) => {
                if let Err(e) = led.render(pattern).await {
                    log.info(
                        "indicator",
                        &format!("LED {} did not accept the pattern: {}", led.dir().display(), e),
                    );
                }
            }
            None => log.info("indicator", "no status LED found, skipping LED output"),
        }

        self.display.show_banner(posture, report);
        pattern
    }
}
