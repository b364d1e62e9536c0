//! Activity LED driven through the sysfs LED class.
//!
//! `brightness` is the control file. Continuous cycles are handed to the
//! kernel `timer` trigger so they keep running after this process has
//! exec'd into the next stage; if the trigger is not available a few
//! cycles are drawn by hand instead.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{IndicatorPattern, Steady};
use crate::common::sysfs;

/// Cycles drawn by hand when the kernel cannot blink for us.
const FALLBACK_CYCLES: usize = 5;

/// Toggle period of the hand-drawn probing pattern.
const PROBE_TOGGLE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct Led {
    dir: PathBuf,
    on_value: String,
}

impl Led {
    /// First directory in `dirs` that has a `brightness` file.
    pub fn discover(dirs: &[PathBuf]) -> Option<Self> {
        dirs.iter().find_map(|dir| Self::open(dir))
    }

    pub fn open(dir: &Path) -> Option<Self> {
        if !dir.join("brightness").is_file() {
            return None;
        }
        let on_value = sysfs::read_trimmed(&dir.join("max_brightness"))
            .ok()
            .filter(|v| v.parse::<u32>().map(|n| n > 0).unwrap_or(false))
            .unwrap_or_else(|| "1".to_string());
        Some(Self {
            dir: dir.to_path_buf(),
            on_value,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn set(&self, on: bool) -> io::Result<()> {
        let value = if on { self.on_value.as_str() } else { "0" };
        sysfs::write_value(&self.dir.join("brightness"), value)
    }

    fn set_trigger(&self, trigger: &str) -> io::Result<()> {
        sysfs::write_value(&self.dir.join("trigger"), trigger)
    }

    /// Detach whatever kernel trigger owns the LED (usually `mmc0`).
    fn take_manual(&self) {
        let _ = self.set_trigger("none");
    }

    fn start_timer(&self, on_ms: u64, off_ms: u64) -> io::Result<()> {
        self.set_trigger("timer")?;
        sysfs::write_value(&self.dir.join("delay_on"), &on_ms.to_string())?;
        sysfs::write_value(&self.dir.join("delay_off"), &off_ms.to_string())
    }

    /// Show `pattern`. Returns once the steady state is in place.
    pub async fn render(&self, pattern: IndicatorPattern) -> io::Result<()> {
        self.take_manual();

        for step in pattern.preamble() {
            self.set(step.on)?;
            tokio::time::sleep(Duration::from_millis(step.ms)).await;
        }

        match pattern.steady() {
            Steady::On => self.set(true),
            Steady::Blink { on_ms, off_ms } => {
                if self.start_timer(on_ms, off_ms).is_ok() {
                    return Ok(());
                }
                self.take_manual();
                for _ in 0..FALLBACK_CYCLES {
                    self.set(true)?;
                    tokio::time::sleep(Duration::from_millis(on_ms)).await;
                    self.set(false)?;
                    tokio::time::sleep(Duration::from_millis(off_ms)).await;
                }
                // Held on is the success state; a blink pattern must not
                // settle there once we stop drawing it.
                self.set(false)
            }
        }
    }

    /// Show activity while checks run.
    ///
    /// Prefers the kernel `heartbeat` trigger; otherwise toggles the LED from
    /// a task on the current runtime. Must be called inside a tokio runtime.
    pub fn start_probing(&self) -> ProbeBlink {
        if self.set_trigger("heartbeat").is_ok() {
            return ProbeBlink::Kernel;
        }

        let led = self.clone();
        ProbeBlink::Task(tokio::spawn(async move {
            let mut on = false;
            loop {
                on = !on;
                if led.set(on).is_err() {
                    return;
                }
                tokio::time::sleep(PROBE_TOGGLE).await;
            }
        }))
    }
}

/// Handle for the probing pattern.
#[derive(Debug)]
pub enum ProbeBlink {
    /// Kernel trigger; replaced by the final pattern.
    Kernel,
    Task(JoinHandle<()>),
}

impl ProbeBlink {
    pub fn stop(self) {
        if let ProbeBlink::Task(handle) = self {
            handle.abort();
        }
    }
}
