//! Storage check: the boot device node exists and its first block reads.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{CheckSpec, Severity};

pub const ID: &str = "storage";

/// Bytes read from the start of the device.
pub const BLOCK_SIZE: usize = 512;

pub fn spec(device: PathBuf, timeout: Duration) -> CheckSpec {
    CheckSpec::new(ID, Severity::Critical, timeout, move || probe(&device))
}

/// Check that `device` exists and that its first block can be read.
pub fn probe(device: &Path) -> Result<String, String> {
    fs::metadata(device).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => format!("{} not present", device.display()),
        _ => format!("cannot stat {}: {}", device.display(), e),
    })?;

    let mut file =
        File::open(device).map_err(|e| format!("cannot open {}: {}", device.display(), e))?;

    let mut block = [0u8; BLOCK_SIZE];
    file.read_exact(&mut block)
        .map_err(|e| format!("cannot read first block of {}: {}", device.display(), e))?;

    let mut message = format!(
        "{} first block readable ({} bytes)",
        device.display(),
        BLOCK_SIZE
    );
    if has_mbr_signature(&block) {
        message.push_str(", partition table present");
    }
    Ok(message)
}

/// `0x55 0xAA` at offset 510 marks an MBR/boot sector.
fn has_mbr_signature(block: &[u8; BLOCK_SIZE]) -> bool {
    block[510] == 0x55 && block[511] == 0xAA
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_device_fails() {
        let dir = TempDir::new().unwrap();
        let err = probe(&dir.path().join("mmcblk0")).unwrap_err();
        assert!(err.contains("not present"));
    }

    #[test]
    fn test_short_device_fails() {
        let dir = TempDir::new().unwrap();
        let device = dir.path().join("mmcblk0");
        fs::write(&device, [0u8; 100]).unwrap();
        let err = probe(&device).unwrap_err();
        assert!(err.contains("cannot read first block"));
    }

    #[test]
    fn test_readable_device_passes() {
        let dir = TempDir::new().unwrap();
        let device = dir.path().join("mmcblk0");
        let mut image = vec![0u8; 4096];
        image[510] = 0x55;
        image[511] = 0xAA;
        fs::write(&device, &image).unwrap();

        let message = probe(&device).unwrap();
        assert!(message.contains("first block readable"));
        assert!(message.contains("partition table present"));
    }

    #[test]
    fn test_directory_is_not_a_device() {
        let dir = TempDir::new().unwrap();
        assert!(probe(dir.path()).is_err());
    }
}
