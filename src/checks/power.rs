//! Power check: firmware under-voltage flags.
//!
//! The Raspberry Pi firmware exposes a `get_throttled` bit field. Bit 0 is
//! "under-voltage right now", bit 16 is "under-voltage has occurred since
//! boot". Either one fails the check. If the kernel does not expose the
//! field at all the check passes: we cannot report what we cannot observe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{CheckSpec, Severity};
use crate::common::sysfs;

pub const ID: &str = "power";

pub const UNDER_VOLTAGE_NOW: u64 = 1 << 0;
pub const FREQ_CAPPED_NOW: u64 = 1 << 1;
pub const THROTTLED_NOW: u64 = 1 << 2;
pub const SOFT_TEMP_LIMIT_NOW: u64 = 1 << 3;
pub const UNDER_VOLTAGE_OCCURRED: u64 = 1 << 16;

pub fn spec(flags_path: PathBuf, timeout: Duration) -> CheckSpec {
    CheckSpec::new(ID, Severity::Warning, timeout, move || probe(&flags_path))
}

pub fn probe(flags_path: &Path) -> Result<String, String> {
    let raw = sysfs::read_optional(flags_path)
        .map_err(|e| format!("cannot read {}: {}", flags_path.display(), e))?;

    let Some(raw) = raw else {
        return Ok("throttle flags not exposed, nothing to report".to_string());
    };

    let flags =
        sysfs::parse_hex(&raw).ok_or_else(|| format!("unparseable throttle flags '{}'", raw))?;
    evaluate(flags)
}

/// Judge a `get_throttled` value.
pub fn evaluate(flags: u64) -> Result<String, String> {
    if flags & UNDER_VOLTAGE_NOW != 0 {
        return Err(format!("under-voltage detected (get_throttled={:#x})", flags));
    }
    if flags & UNDER_VOLTAGE_OCCURRED != 0 {
        return Err(format!(
            "under-voltage occurred since boot (get_throttled={:#x})",
            flags
        ));
    }

    let mut message = format!("no under-voltage (get_throttled={:#x})", flags);
    if flags & (FREQ_CAPPED_NOW | THROTTLED_NOW | SOFT_TEMP_LIMIT_NOW) != 0 {
        message.push_str(", CPU currently throttled");
    }
    Ok(message)
}
