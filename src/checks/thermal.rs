//! Thermal check: SoC temperature below the configured limit.
//!
//! A missing thermal zone passes, same rule as the power check.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{CheckSpec, Severity};
use crate::common::sysfs;

pub const ID: &str = "thermal";

pub fn spec(zone_temp: PathBuf, limit_millic: u64, timeout: Duration) -> CheckSpec {
    CheckSpec::new(ID, Severity::Warning, timeout, move || {
        probe(&zone_temp, limit_millic)
    })
}

pub fn probe(zone_temp: &Path, limit_millic: u64) -> Result<String, String> {
    let raw = sysfs::read_optional(zone_temp)
        .map_err(|e| format!("cannot read {}: {}", zone_temp.display(), e))?;

    let Some(raw) = raw else {
        return Ok("no thermal zone exposed, nothing to report".to_string());
    };

    let millic: i64 = raw
        .parse()
        .map_err(|_| format!("unparseable temperature '{}'", raw))?;
    let celsius = millic as f64 / 1000.0;
    let limit = limit_millic as f64 / 1000.0;

    if millic >= limit_millic as i64 {
        Err(format!("SoC at {:.1}°C, limit {:.1}°C", celsius, limit))
    } else {
        Ok(format!("SoC at {:.1}°C", celsius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cool_soc_passes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "48312\n").unwrap();
        assert_eq!(probe(&path, 80_000).unwrap(), "SoC at 48.3°C");
    }

    #[test]
    fn test_hot_soc_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "85000").unwrap();
        assert!(probe(&path, 80_000).unwrap_err().contains("limit 80.0°C"));
    }

    #[test]
    fn test_missing_zone_passes() {
        let dir = TempDir::new().unwrap();
        assert!(probe(&dir.path().join("temp"), 80_000).is_ok());
    }
}
