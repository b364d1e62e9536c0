//! Shared test utilities for bootguard tests.
//!
//! [`TestEnv`] lays out a fake board (proc, sys, dev and a main root
//! filesystem) in a temp dir and points a [`Config`] at it. [`FakePlatform`]
//! stands in for mount and exec.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use bootguard::checks::{self, CheckSpec};
use bootguard::config::Config;
use bootguard::error::RecoveryReason;
use bootguard::eventlog::{EventLog, MemorySink};
use bootguard::handoff::{HandoffTarget, Platform};
use bootguard::indicator::{Display, Led, Signaler};
use bootguard::orchestrator::{Attempt, Orchestrator};

/// A Raspberry Pi that passes every check.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Stands in for `/` of the initramfs
    pub root: PathBuf,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        let mut block = vec![0u8; 1024];
        block[510] = 0x55;
        block[511] = 0xAA;
        write(&root.join("dev/mmcblk0"), &block);
        write(&root.join("dev/console"), b"");

        write(
            &root.join("sys/devices/platform/soc/soc:firmware/get_throttled"),
            b"0\n",
        );
        write(&root.join("proc/cpuinfo"), cpuinfo(4).as_bytes());
        for n in 0..4 {
            fs::create_dir_all(root.join(format!("sys/devices/system/cpu/cpu{}", n)))
                .expect("Failed to create cpu dir");
        }
        write(
            &root.join("proc/meminfo"),
            b"MemTotal:        3884376 kB\nMemFree:         3605484 kB\nMemAvailable:    3700124 kB\n",
        );
        write(&root.join("sys/class/thermal/thermal_zone0/temp"), b"48312\n");

        let led = root.join("sys/class/leds/ACT");
        write(&led.join("brightness"), b"0\n");
        write(&led.join("max_brightness"), b"255\n");
        write(&led.join("trigger"), b"none [mmc0] timer heartbeat\n");
        write(&led.join("delay_on"), b"0\n");
        write(&led.join("delay_off"), b"0\n");

        install_executable(&root.join("newroot/sbin/init"));

        let config = Config {
            storage_device: root.join("dev/mmcblk0"),
            throttled_path: root.join("sys/devices/platform/soc/soc:firmware/get_throttled"),
            cpuinfo_path: root.join("proc/cpuinfo"),
            cpu_sysfs_dir: root.join("sys/devices/system/cpu"),
            meminfo_path: root.join("proc/meminfo"),
            thermal_path: root.join("sys/class/thermal/thermal_zone0/temp"),
            check_timeout_ms: 2_000,
            storage_timeout_ms: 2_000,
            led_dirs: vec![root.join("sys/class/leds/ACT"), root.join("sys/class/leds/led0")],
            console_path: root.join("dev/console"),
            framebuffer_path: root.join("dev/fb0"),
            fbcon_tty: root.join("dev/tty1"),
            log_path: root.join("run/bootguard.log"),
            kmsg_path: None,
            new_root: root.join("newroot"),
            cmdline_path: root.join("proc/cmdline"),
            ..Config::default()
        };

        Self {
            _temp_dir: temp_dir,
            root,
            config,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("Failed to read test file")
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path(relative)).expect("Failed to remove test file");
    }

    pub fn set_throttled(&self, value: &str) {
        write(
            &self.path("sys/devices/platform/soc/soc:firmware/get_throttled"),
            value.as_bytes(),
        );
    }

    pub fn registry(&self) -> Vec<CheckSpec> {
        checks::registry(&self.config)
    }

    pub fn signaler(&self) -> Signaler {
        Signaler::new(
            Led::discover(&self.config.led_dirs),
            Display::from_config(&self.config),
        )
    }

    /// Run one boot attempt with an in-memory log. Returns the attempt and
    /// every logged line.
    pub async fn boot(
        &self,
        registry: Vec<CheckSpec>,
        platform: &mut FakePlatform,
    ) -> (Attempt, Vec<String>) {
        let memory = MemorySink::new();
        let mut log = EventLog::new().with_sink(memory.clone());
        let attempt = self.boot_with_log(registry, platform, &mut log).await;
        (attempt, memory.lines())
    }

    pub async fn boot_with_log(
        &self,
        registry: Vec<CheckSpec>,
        platform: &mut FakePlatform,
        log: &mut EventLog,
    ) -> Attempt {
        let signaler = self.signaler();
        let orchestrator = Orchestrator {
            signaler: &signaler,
            platform,
            target: HandoffTarget::from_config(&self.config),
            policy: self.config.degraded_policy,
        };
        orchestrator.run(registry, log).await
    }
}

/// Records every platform call instead of touching the system.
#[derive(Debug, Default)]
pub struct FakePlatform {
    pub calls: Vec<String>,
    pub mount_error: Option<RecoveryReason>,
    pub transfer_error: Option<RecoveryReason>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount_attempted(&self) -> bool {
        self.calls.iter().any(|c| c.starts_with("mount "))
    }

    pub fn transferred(&self) -> Option<&str> {
        self.calls
            .iter()
            .find_map(|c| c.strip_prefix("transfer "))
    }
}

impl Platform for FakePlatform {
    fn resolve_device(&mut self, spec: &str) -> Result<PathBuf, RecoveryReason> {
        self.calls.push(format!("resolve {}", spec));
        Ok(PathBuf::from(spec))
    }

    fn mount_readonly(
        &mut self,
        device: &Path,
        target: &Path,
        _fstype: Option<&str>,
    ) -> Result<(), RecoveryReason> {
        self.calls
            .push(format!("mount {} {}", device.display(), target.display()));
        match self.mount_error.clone() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    fn release_pseudo_filesystems(&mut self) -> Vec<String> {
        self.calls.push("release".to_string());
        Vec::new()
    }

    fn transfer(&mut self, _new_root: &Path, entry: &Path) -> Result<(), RecoveryReason> {
        self.calls.push(format!("transfer {}", entry.display()));
        match self.transfer_error.clone() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

pub fn cpuinfo(cores: usize) -> String {
    let mut text = String::new();
    for n in 0..cores {
        text.push_str(&format!(
            "processor\t: {}\nBogoMIPS\t: 108.00\nCPU part\t: 0xd08\n\n",
            n
        ));
    }
    text.push_str("Model\t\t: Raspberry Pi 4 Model B Rev 1.4\n");
    text
}

pub fn write(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write test file");
}

pub fn install_executable(path: &Path) {
    write(path, b"#!/bin/sh\nexit 0\n");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to set permissions");
}
