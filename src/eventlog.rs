//! Append-only boot event log.
//!
//! Every component that records events gets an [`EventLog`] handed in; the
//! log fans each line out to its sinks. Lines are never rewritten, and each
//! one is flushed before the next is produced.
//!
//! Line format:
//!
//! ```text
//! [OK] storage: /dev/mmcblk0 first block readable (512 bytes)
//! [WARN] power: under-voltage detected (get_throttled=0x50005)
//! [FAIL] cpu: TIMEOUT after 5000ms (no response from probe)
//! [INFO] handoff: mounted /dev/mmcblk0p2 read-only at /newroot
//! == summary ==
//! passed: 2
//! warned: 1
//! failed: 1
//! posture: CRITICAL
//! RECOVERY_SHELL
//! ```

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::checks::{CheckResult, Counts};
use crate::config::Config;
use crate::orchestrator::BootOutcome;
use crate::posture::Posture;

/// Destination for log lines.
pub trait LogSink: Send {
    /// Append one line (without trailing newline) and flush it.
    fn append(&mut self, line: &str) -> io::Result<()>;
}

/// Plain append-only file.
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        Ok(Self { file })
    }
}

impl LogSink for FileSink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{}", line)?;
        self.file.flush()
    }
}

/// Kernel ring buffer. Each write becomes one kmsg record, so the lines
/// survive `switch_root` and show up in the main system's `dmesg`.
pub struct KmsgSink {
    file: File,
}

impl KmsgSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self { file })
    }
}

impl LogSink for KmsgSink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        self.file
            .write_all(format!("bootguard: {}\n", line).as_bytes())
    }
}

/// In-memory sink. Clones share the same buffer, so a test can keep one
/// handle and give the other to the log.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn append(&mut self, line: &str) -> io::Result<()> {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
        Ok(())
    }
}

struct Slot {
    sink: Box<dyn LogSink>,
    broken: bool,
}

/// Fan-out event log.
///
/// A sink that fails once is reported on stderr and then skipped; losing a
/// log destination never interrupts the boot attempt.
#[derive(Default)]
pub struct EventLog {
    slots: Vec<Slot>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log with the configured file and kmsg sinks. A sink that cannot be
    /// opened is reported and left out.
    pub fn from_config(config: &Config) -> Self {
        let mut log = Self::new();

        match FileSink::open(&config.log_path) {
            Ok(sink) => log.add_sink(sink),
            Err(e) => eprintln!("  [WARN] {:#}", e),
        }
        if let Some(kmsg) = &config.kmsg_path {
            match KmsgSink::open(kmsg) {
                Ok(sink) => log.add_sink(sink),
                Err(e) => eprintln!("  [WARN] {:#}", e),
            }
        }

        log
    }

    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&mut self, sink: impl LogSink + 'static) {
        self.slots.push(Slot {
            sink: Box::new(sink),
            broken: false,
        });
    }

    pub fn sink_count(&self) -> usize {
        self.slots.len()
    }

    /// Append a raw line to every healthy sink.
    pub fn line(&mut self, line: &str) {
        for slot in self.slots.iter_mut().filter(|s| !s.broken) {
            if let Err(e) = slot.sink.append(line) {
                eprintln!("  [WARN] Event log sink failed, disabling it: {}", e);
                slot.broken = true;
            }
        }
    }

    pub fn check(&mut self, result: &CheckResult) {
        self.line(&format_check(result));
    }

    pub fn info(&mut self, component: &str, text: &str) {
        self.line(&format!("[INFO] {}: {}", component, text));
    }

    pub fn failure(&mut self, component: &str, text: &str) {
        self.line(&format!("[FAIL] {}: {}", component, text));
    }

    pub fn summary(&mut self, counts: Counts, posture: Posture) {
        for line in format_summary(counts, posture) {
            self.line(&line);
        }
    }

    pub fn terminal(&mut self, outcome: BootOutcome) {
        self.line(outcome.marker());
    }
}

/// `[OK|WARN|FAIL] <id>: <message>`
pub fn format_check(result: &CheckResult) -> String {
    format!("[{}] {}: {}", result.tag(), result.id, result.message)
}

pub fn format_summary(counts: Counts, posture: Posture) -> Vec<String> {
    vec![
        "== summary ==".to_string(),
        format!("passed: {}", counts.passed),
        format!("warned: {}", counts.warned),
        format!("failed: {}", counts.failed),
        format!("posture: {}", posture),
    ]
}
