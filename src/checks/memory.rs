//! Memory check: the kernel sees at least the expected amount of RAM.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{CheckSpec, Severity};

pub const ID: &str = "memory";

pub fn spec(meminfo: PathBuf, min_mib: u64, timeout: Duration) -> CheckSpec {
    CheckSpec::new(ID, Severity::Warning, timeout, move || {
        probe(&meminfo, min_mib)
    })
}

pub fn probe(meminfo: &Path, min_mib: u64) -> Result<String, String> {
    let text = fs::read_to_string(meminfo)
        .map_err(|e| format!("cannot read {}: {}", meminfo.display(), e))?;

    let total_mib = meminfo_kib(&text, "MemTotal")
        .ok_or_else(|| "MemTotal missing from meminfo".to_string())?
        / 1024;

    if total_mib < min_mib {
        return Err(format!(
            "only {} MiB RAM visible (expected at least {} MiB)",
            total_mib, min_mib
        ));
    }

    Ok(match meminfo_kib(&text, "MemAvailable") {
        Some(avail) => format!("{} MiB total, {} MiB available", total_mib, avail / 1024),
        None => format!("{} MiB total", total_mib),
    })
}

/// Value of a `Key:   1234 kB` line.
pub fn meminfo_kib(text: &str, key: &str) -> Option<u64> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.trim() == key)
        .and_then(|(_, value)| value.split_whitespace().next()?.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MEMINFO: &str = "MemTotal:        3884096 kB\nMemFree:         3601004 kB\nMemAvailable:    3650212 kB\n";

    #[test]
    fn test_meminfo_kib() {
        assert_eq!(meminfo_kib(MEMINFO, "MemTotal"), Some(3884096));
        assert_eq!(meminfo_kib(MEMINFO, "SwapTotal"), None);
    }

    #[test]
    fn test_enough_memory_passes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meminfo");
        fs::write(&path, MEMINFO).unwrap();
        assert_eq!(
            probe(&path, 128).unwrap(),
            "3793 MiB total, 3564 MiB available"
        );
    }

    #[test]
    fn test_too_little_memory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meminfo");
        fs::write(&path, "MemTotal: 65536 kB\n").unwrap();
        assert!(probe(&path, 128).unwrap_err().contains("only 64 MiB"));
    }
}
