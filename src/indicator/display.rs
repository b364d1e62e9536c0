//! Text status output on the console and framebuffer console.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::checks::DiagnosticReport;
use crate::config::Config;
use crate::posture::Posture;

const RULE: &str = "========================================";

/// Writes status text to every reachable terminal.
#[derive(Debug, Clone)]
pub struct Display {
    targets: Vec<PathBuf>,
}

impl Display {
    pub fn new(targets: Vec<PathBuf>) -> Self {
        Self { targets }
    }

    /// Console device, plus the framebuffer console when a framebuffer exists.
    pub fn from_config(config: &Config) -> Self {
        let mut targets = vec![config.console_path.clone()];
        if config.framebuffer_path.exists() && config.fbcon_tty != config.console_path {
            targets.push(config.fbcon_tty.clone());
        }
        Self { targets }
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    pub fn show_banner(&self, posture: Posture, report: &DiagnosticReport) -> usize {
        self.write_all(&render_banner(posture, report))
    }

    /// One-off notice, e.g. why handoff was refused.
    pub fn show_notice(&self, text: &str) -> usize {
        self.write_all(&format!("bootguard: {}\n", text))
    }

    /// Write `text` to every target. Falls back to stdout when none of them
    /// could be opened. Returns the number of targets written.
    fn write_all(&self, text: &str) -> usize {
        let written = self
            .targets
            .iter()
            .filter(|target| write_terminal(target, text))
            .count();
        if written == 0 {
            print!("{}", text);
        }
        written
    }
}

fn write_terminal(path: &Path, text: &str) -> bool {
    OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut tty| tty.write_all(text.as_bytes()))
        .is_ok()
}

/// Banner text: posture, counts and every check that did not pass.
pub fn render_banner(posture: Posture, report: &DiagnosticReport) -> String {
    let counts = report.counts();
    let hint = match posture {
        Posture::Healthy => "all checks passed",
        Posture::Degraded => "warnings present, see below",
        Posture::Critical => "critical failure, boot refused",
    };

    let mut out = String::new();
    out.push('\n');
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(" BOOT HEALTH: {} ({})\n", posture, hint));
    out.push_str(&format!(
        " passed {} | warned {} | failed {}\n",
        counts.passed, counts.warned, counts.failed
    ));
    for result in report.problems() {
        out.push_str(&format!(" [{}] {}: {}\n", result.tag(), result.id, result.message));
    }
    out.push_str(RULE);
    out.push('\n');
    out
}
