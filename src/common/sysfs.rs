//! Small helpers for reading and writing sysfs/procfs attribute files.
//!
//! Attribute files hold a single value and a trailing newline. Reads trim it;
//! writes never create files, because a missing attribute means the kernel
//! does not expose that control.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Read an attribute file and trim surrounding whitespace.
pub fn read_trimmed(path: &Path) -> io::Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

/// Read an attribute file, mapping "does not exist" to `Ok(None)`.
///
/// Probes use this when an absent source means "cannot observe" rather
/// than "broken".
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match read_trimmed(path) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write a value to an existing attribute file.
pub fn write_value(path: &Path, value: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(value.as_bytes())?;
    file.flush()
}

/// Parse a hex attribute. The firmware driver prints flag words with
/// `%x`, so there is usually no `0x` prefix; one is accepted anyway.
pub fn parse_hex(value: &str) -> Option<u64> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).ok()
}
