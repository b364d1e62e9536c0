//! Operating-system side of the handoff: device lookup, mounts, exec.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::RecoveryReason;
use crate::process::{find_program, Cmd};

/// Everything the handoff state machine needs from the system.
pub trait Platform {
    /// Turn a `root=` value into a device node.
    fn resolve_device(&mut self, spec: &str) -> Result<PathBuf, RecoveryReason>;

    /// Mount `device` read-only at `target`.
    fn mount_readonly(
        &mut self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
    ) -> Result<(), RecoveryReason>;

    /// Release the pseudo-filesystems mounted for diagnostics.
    /// Returns one message per mount that could not be released.
    fn release_pseudo_filesystems(&mut self) -> Vec<String>;

    /// Hand control to `entry` inside `new_root`. On real hardware this
    /// only returns on failure.
    fn transfer(&mut self, new_root: &Path, entry: &Path) -> Result<(), RecoveryReason>;
}

/// A kernel pseudo-filesystem the diagnostics depend on.
#[derive(Debug, Clone, Copy)]
pub struct PseudoFs {
    pub fstype: &'static str,
    pub target: &'static str,
}

pub const PSEUDO_FILESYSTEMS: &[PseudoFs] = &[
    PseudoFs { fstype: "proc", target: "/proc" },
    PseudoFs { fstype: "sysfs", target: "/sys" },
    PseudoFs { fstype: "devtmpfs", target: "/dev" },
];

/// Pseudo-filesystems mounted by us, in mount order.
///
/// Ones that were already mounted (kernel automount of devtmpfs, or a shell
/// script running before us) are left alone and never unmounted.
#[derive(Debug, Default)]
pub struct PseudoMounts {
    mounted: Vec<PathBuf>,
}

impl PseudoMounts {
    /// Mount whatever is missing. Failures are reported and skipped; the
    /// checks that depend on them will fail on their own.
    pub fn setup() -> Self {
        let mut mounts = Self::default();

        for fs in PSEUDO_FILESYSTEMS {
            let target = Path::new(fs.target);
            if is_mountpoint(target) {
                continue;
            }
            if let Err(e) = fs::create_dir_all(target) {
                eprintln!("  [WARN] cannot create {}: {}", fs.target, e);
                continue;
            }
            let result = Cmd::new("mount")
                .args(["-t", fs.fstype, fs.fstype])
                .arg_path(target)
                .error_msg(format!("mount {} on {}", fs.fstype, fs.target))
                .run();
            match result {
                Ok(_) => mounts.mounted.push(target.to_path_buf()),
                Err(e) => eprintln!("  [WARN] {:#}", e),
            }
        }

        mounts
    }

    pub fn mounted(&self) -> &[PathBuf] {
        &self.mounted
    }

    /// Lazily unmount in reverse order. A busy `/dev` (our own console
    /// handles) detaches instead of failing.
    pub fn release(&mut self) -> Vec<String> {
        let mut problems = Vec::new();
        while let Some(target) = self.mounted.pop() {
            let result = Cmd::new("umount")
                .arg("-l")
                .arg_path(&target)
                .error_msg(format!("umount {}", target.display()))
                .run();
            if let Err(e) = result {
                problems.push(format!("{:#}", e));
            }
        }
        problems
    }
}

/// True if `path` is the root of a mounted filesystem.
pub fn is_mountpoint(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    match fs::metadata(path.join("..")) {
        Ok(parent) => meta.dev() != parent.dev() || meta.ino() == parent.ino(),
        Err(_) => false,
    }
}

/// Map `mount` stderr onto a recovery reason.
///
/// The device node was already confirmed to exist, so `ENODEV` here means
/// the kernel has no driver for the filesystem type.
pub fn classify_mount_error(device: &Path, stderr: &str) -> RecoveryReason {
    let device = device.display().to_string();
    let detail = stderr.trim().to_string();
    let lower = detail.to_lowercase();

    if lower.contains("no such file") || lower.contains("does not exist") {
        RecoveryReason::DeviceMissing(device)
    } else if lower.contains("unknown filesystem")
        || lower.contains("wrong fs type")
        || lower.contains("bad superblock")
        || lower.contains("no such device")
        || lower.contains("invalid argument")
    {
        RecoveryReason::FilesystemUnrecognized { device, detail }
    } else {
        RecoveryReason::MountIo { device, detail }
    }
}

/// Normalize a kernel-style root spec. Tagged forms (`PARTUUID=`, `UUID=`,
/// `LABEL=`) are returned as `None` and need a lookup.
pub fn direct_device_path(spec: &str) -> Option<PathBuf> {
    if spec.starts_with('/') {
        return Some(PathBuf::from(spec));
    }
    if spec.contains('=') {
        return None;
    }
    Some(Path::new("/dev").join(spec))
}

/// The real system: external `mount`, `findfs`, `umount` and `switch_root`.
#[derive(Debug, Default)]
pub struct SystemPlatform {
    pseudo: PseudoMounts,
}

impl SystemPlatform {
    pub fn new(pseudo: PseudoMounts) -> Self {
        Self { pseudo }
    }
}

impl Platform for SystemPlatform {
    fn resolve_device(&mut self, spec: &str) -> Result<PathBuf, RecoveryReason> {
        if let Some(path) = direct_device_path(spec) {
            return Ok(path);
        }

        let result = Cmd::new("findfs")
            .arg(spec)
            .allow_fail()
            .run()
            .map_err(|e| RecoveryReason::DeviceMissing(format!("{} ({:#})", spec, e)))?;
        let found = result.stdout_trimmed();
        if !result.success() || found.is_empty() {
            return Err(RecoveryReason::DeviceMissing(spec.to_string()));
        }
        Ok(PathBuf::from(found))
    }

    fn mount_readonly(
        &mut self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
    ) -> Result<(), RecoveryReason> {
        if !device.exists() {
            return Err(RecoveryReason::DeviceMissing(device.display().to_string()));
        }
        fs::create_dir_all(target).map_err(|e| RecoveryReason::MountIo {
            device: device.display().to_string(),
            detail: format!("cannot create {}: {}", target.display(), e),
        })?;

        let mut cmd = Cmd::new("mount").args(["-o", "ro"]);
        if let Some(fstype) = fstype {
            cmd = cmd.args(["-t", fstype]);
        }
        let result = cmd
            .arg_path(device)
            .arg_path(target)
            .allow_fail()
            .run()
            .map_err(|e| RecoveryReason::MountIo {
                device: device.display().to_string(),
                detail: format!("{:#}", e),
            })?;

        if result.success() {
            Ok(())
        } else {
            Err(classify_mount_error(device, result.stderr_trimmed()))
        }
    }

    fn release_pseudo_filesystems(&mut self) -> Vec<String> {
        self.pseudo.release()
    }

    fn transfer(&mut self, new_root: &Path, entry: &Path) -> Result<(), RecoveryReason> {
        let switch_root = find_program("switch_root")
            .ok_or_else(|| RecoveryReason::TransferFailed("switch_root not found".to_string()))?;

        let err = Command::new(switch_root).arg(new_root).arg(entry).exec();
        Err(RecoveryReason::TransferFailed(err.to_string()))
    }
}
