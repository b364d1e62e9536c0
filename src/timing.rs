//! Check timing utilities.

use std::time::Instant;

/// A simple timer for measuring how long a probe took.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    /// Start a new timer with the given check name.
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Finish the timer and print the elapsed time with a status tag to stderr.
    pub fn finish(self, status: &str) {
        let secs = self.start.elapsed().as_secs_f64();
        eprintln!("  [{:.1}s] {} {}", secs, self.name, status);
    }
}
