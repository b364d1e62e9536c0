//! Handoff to the main root filesystem.
//!
//! ```text
//! Idle -> MountAttempt -> MountFailed -> Recovery
//!                      -> ValidateInit -> NotFound -> Recovery
//!                                      -> UnmountTemp -> Transfer
//! ```
//!
//! Mounting, unmounting and the final exec go through [`Platform`]; the
//! state machine itself only decides the order and what gets logged.

pub mod platform;

use std::fs::{self, Metadata};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::RecoveryReason;
use crate::eventlog::EventLog;
use crate::orchestrator::BootOutcome;

pub use platform::{Platform, PseudoMounts, SystemPlatform};

/// Symlink hops followed inside the new root before giving up.
const MAX_LINK_HOPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    Idle,
    MountAttempt,
    ValidateInit,
    UnmountTemp,
    Transfer,
    Recovery,
}

/// Result of a handoff attempt.
///
/// With the real platform `Transferred` is never observed: the process image
/// has been replaced by then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    Transferred,
    RecoveryNeeded(RecoveryReason),
}

/// Where to find and how to start the main system.
#[derive(Debug, Clone)]
pub struct HandoffTarget {
    pub root_device: String,
    pub fstype: Option<String>,
    pub new_root: PathBuf,
    pub init_candidates: Vec<PathBuf>,
}

impl HandoffTarget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root_device: config.root_device.clone(),
            fstype: config.root_fstype.clone(),
            new_root: config.new_root.clone(),
            init_candidates: config.init_candidates.clone(),
        }
    }
}

pub struct HandoffExecutor<'a, P: Platform> {
    platform: &'a mut P,
    target: HandoffTarget,
    trail: Vec<HandoffState>,
}

impl<'a, P: Platform> HandoffExecutor<'a, P> {
    pub fn new(platform: &'a mut P, target: HandoffTarget) -> Self {
        Self {
            platform,
            target,
            trail: vec![HandoffState::Idle],
        }
    }

    /// States visited so far, starting with `Idle`.
    pub fn trail(&self) -> &[HandoffState] {
        &self.trail
    }

    /// Run the state machine to a terminal state.
    pub fn execute(&mut self, log: &mut EventLog) -> HandoffOutcome {
        match self.try_handoff(log) {
            Ok(()) => HandoffOutcome::Transferred,
            Err(reason) => {
                self.enter(HandoffState::Recovery);
                log.failure("handoff", &reason.to_string());
                HandoffOutcome::RecoveryNeeded(reason)
            }
        }
    }

    fn enter(&mut self, state: HandoffState) {
        self.trail.push(state);
    }

    fn try_handoff(&mut self, log: &mut EventLog) -> Result<(), RecoveryReason> {
        self.enter(HandoffState::MountAttempt);
        let device = self.platform.resolve_device(&self.target.root_device)?;
        self.platform
            .mount_readonly(&device, &self.target.new_root, self.target.fstype.as_deref())?;
        log.info(
            "handoff",
            &format!(
                "mounted {} read-only at {}",
                device.display(),
                self.target.new_root.display()
            ),
        );

        self.enter(HandoffState::ValidateInit);
        let entry = find_entry_point(&self.target.new_root, &self.target.init_candidates)
            .ok_or_else(|| RecoveryReason::EntryPointAbsent {
                root: self.target.new_root.display().to_string(),
                tried: self
                    .target
                    .init_candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
        log.info("handoff", &format!("entry point {}", entry.display()));

        self.enter(HandoffState::UnmountTemp);
        for problem in self.platform.release_pseudo_filesystems() {
            log.info("handoff", &format!("unmount: {}", problem));
        }

        self.enter(HandoffState::Transfer);
        log.info(
            "handoff",
            &format!(
                "switching root to {} with {}",
                self.target.new_root.display(),
                entry.display()
            ),
        );
        // Nothing after a successful transfer runs, so the terminal line
        // has to be written first.
        log.terminal(BootOutcome::HandedOff);
        self.platform.transfer(&self.target.new_root, &entry)
    }
}

/// First candidate that is an executable file inside `root`.
///
/// Returns the path as seen from inside the new root (`/sbin/init`), which
/// is what `switch_root` expects.
pub fn find_entry_point(root: &Path, candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find_map(|candidate| {
        let relative = candidate.strip_prefix("/").unwrap_or(candidate);
        resolve_in_root(root, relative).map(|_| Path::new("/").join(relative))
    })
}

/// Follow symlinks with absolute targets re-rooted under `root`.
///
/// The mounted system's `/sbin/init` is typically an absolute link to
/// `/lib/systemd/systemd`, which would point into the initramfs if the
/// kernel resolved it from here.
fn resolve_in_root(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = root.join(relative);

    for _ in 0..MAX_LINK_HOPS {
        let meta = fs::symlink_metadata(&current).ok()?;
        if !meta.file_type().is_symlink() {
            return is_executable_file(&meta).then_some(current);
        }

        let link = fs::read_link(&current).ok()?;
        current = match link.strip_prefix("/") {
            Ok(inside) => root.join(inside),
            Err(_) => current.parent()?.join(link),
        };
    }
    None
}

fn is_executable_file(meta: &Metadata) -> bool {
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::MemorySink;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn executable(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn candidates() -> Vec<PathBuf> {
        Config::default().init_candidates
    }

    #[derive(Default)]
    struct StubPlatform {
        mount_error: Option<RecoveryReason>,
        transferred: Option<(PathBuf, PathBuf)>,
        released: bool,
    }

    impl Platform for StubPlatform {
        fn resolve_device(&mut self, spec: &str) -> Result<PathBuf, RecoveryReason> {
            Ok(PathBuf::from(spec))
        }

        fn mount_readonly(
            &mut self,
            _device: &Path,
            _target: &Path,
            _fstype: Option<&str>,
        ) -> Result<(), RecoveryReason> {
            match self.mount_error.clone() {
                Some(reason) => Err(reason),
                None => Ok(()),
            }
        }

        fn release_pseudo_filesystems(&mut self) -> Vec<String> {
            self.released = true;
            vec!["/dev busy".to_string()]
        }

        fn transfer(&mut self, new_root: &Path, entry: &Path) -> Result<(), RecoveryReason> {
            self.transferred = Some((new_root.to_path_buf(), entry.to_path_buf()));
            Ok(())
        }
    }

    fn target(root: &Path) -> HandoffTarget {
        HandoffTarget {
            root_device: "/dev/mmcblk0p2".to_string(),
            fstype: None,
            new_root: root.to_path_buf(),
            init_candidates: candidates(),
        }
    }

    #[test]
    fn test_plain_init_binary() {
        let root = TempDir::new().unwrap();
        executable(&root.path().join("sbin/init"));
        assert_eq!(
            find_entry_point(root.path(), &candidates()),
            Some(PathBuf::from("/sbin/init"))
        );
    }

    #[test]
    fn test_service_manager_fallback() {
        let root = TempDir::new().unwrap();
        executable(&root.path().join("usr/lib/systemd/systemd"));
        assert_eq!(
            find_entry_point(root.path(), &candidates()),
            Some(PathBuf::from("/usr/lib/systemd/systemd"))
        );
    }

    #[test]
    fn test_absolute_symlink_is_rerooted() {
        let root = TempDir::new().unwrap();
        executable(&root.path().join("lib/systemd/systemd"));
        fs::create_dir_all(root.path().join("sbin")).unwrap();
        symlink("/lib/systemd/systemd", root.path().join("sbin/init")).unwrap();

        assert_eq!(
            find_entry_point(root.path(), &[PathBuf::from("sbin/init")]),
            Some(PathBuf::from("/sbin/init"))
        );
    }

    #[test]
    fn test_dangling_symlink_and_plain_file_rejected() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("sbin")).unwrap();
        symlink("/nowhere/init", root.path().join("sbin/init")).unwrap();
        fs::create_dir_all(root.path().join("lib/systemd")).unwrap();
        fs::write(root.path().join("lib/systemd/systemd"), "not executable").unwrap();

        assert_eq!(find_entry_point(root.path(), &candidates()), None);
    }

    #[test]
    fn test_symlink_loop_rejected() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("sbin")).unwrap();
        symlink("/sbin/init", root.path().join("sbin/init")).unwrap();
        assert_eq!(find_entry_point(root.path(), &[PathBuf::from("sbin/init")]), None);
    }

    #[test]
    fn test_full_path_to_transfer() {
        let root = TempDir::new().unwrap();
        executable(&root.path().join("sbin/init"));
        let memory = MemorySink::new();
        let mut log = EventLog::new().with_sink(memory.clone());
        let mut platform = StubPlatform::default();

        let mut executor = HandoffExecutor::new(&mut platform, target(root.path()));
        let outcome = executor.execute(&mut log);

        assert_eq!(outcome, HandoffOutcome::Transferred);
        assert_eq!(
            executor.trail(),
            &[
                HandoffState::Idle,
                HandoffState::MountAttempt,
                HandoffState::ValidateInit,
                HandoffState::UnmountTemp,
                HandoffState::Transfer
            ]
        );
        assert!(platform.released);
        assert_eq!(
            platform.transferred,
            Some((root.path().to_path_buf(), PathBuf::from("/sbin/init")))
        );
        assert_eq!(memory.lines().last().map(String::as_str), Some("HANDED_OFF"));
    }

    #[test]
    fn test_mount_failure_goes_to_recovery() {
        let root = TempDir::new().unwrap();
        let memory = MemorySink::new();
        let mut log = EventLog::new().with_sink(memory.clone());
        let mut platform = StubPlatform {
            mount_error: Some(RecoveryReason::DeviceMissing("/dev/mmcblk0p2".into())),
            ..Default::default()
        };

        let mut executor = HandoffExecutor::new(&mut platform, target(root.path()));
        let outcome = executor.execute(&mut log);

        assert_eq!(
            outcome,
            HandoffOutcome::RecoveryNeeded(RecoveryReason::DeviceMissing("/dev/mmcblk0p2".into()))
        );
        assert_eq!(
            executor.trail(),
            &[HandoffState::Idle, HandoffState::MountAttempt, HandoffState::Recovery]
        );
        assert!(!platform.released);
        assert_eq!(
            memory.lines(),
            vec!["[FAIL] handoff: root device /dev/mmcblk0p2 not found"]
        );
    }

    #[test]
    fn test_missing_entry_point_goes_to_recovery() {
        let root = TempDir::new().unwrap();
        let mut log = EventLog::new();
        let mut platform = StubPlatform::default();

        let mut executor = HandoffExecutor::new(&mut platform, target(root.path()));
        let outcome = executor.execute(&mut log);

        assert!(matches!(
            outcome,
            HandoffOutcome::RecoveryNeeded(RecoveryReason::EntryPointAbsent { .. })
        ));
        assert_eq!(executor.trail().last(), Some(&HandoffState::Recovery));
        assert!(platform.transferred.is_none());
    }
}
