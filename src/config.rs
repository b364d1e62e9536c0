//! Configuration management for bootguard.
//!
//! Layers, later ones win:
//! 1. Built-in defaults for a Raspberry Pi booting from its SD card
//! 2. Optional JSON file (`/etc/bootguard.json`, or `$BOOTGUARD_CONFIG`)
//! 3. Optional env file (`/etc/bootguard.env`), then the process environment
//! 4. Kernel command line (`root=`, `rootfstype=`, `bootguard.*`)
//!
//! A bad value in any layer is reported and skipped. Loading never fails:
//! a typo in a config file must not stop the device from booting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default JSON config location inside the initramfs.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/bootguard.json";

/// Default env file location inside the initramfs.
pub const DEFAULT_ENV_FILE: &str = "/etc/bootguard.env";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "BOOTGUARD_";

/// What to do when only warning-level checks fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradedPolicy {
    /// Boot anyway; warnings stay visible in the log and banner.
    Proceed,
    /// Treat a degraded posture like a critical one.
    Block,
}

impl FromStr for DegradedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proceed" => Ok(DegradedPolicy::Proceed),
            "block" => Ok(DegradedPolicy::Block),
            other => Err(format!("unknown degraded policy '{}'", other)),
        }
    }
}

/// Bootguard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Block device probed by the storage check.
    pub storage_device: PathBuf,
    /// Firmware throttling flag word.
    pub throttled_path: PathBuf,
    pub cpuinfo_path: PathBuf,
    /// Fallback core enumeration (`cpuN` directories).
    pub cpu_sysfs_dir: PathBuf,
    pub meminfo_path: PathBuf,
    pub thermal_path: PathBuf,
    pub min_memory_mib: u64,
    /// Millidegrees Celsius.
    pub thermal_limit_millic: u64,
    /// Run the memory and thermal checks.
    pub supplementary_checks: bool,
    /// Default per-check timeout.
    pub check_timeout_ms: u64,
    /// Storage gets its own budget since SD cards can be slow to wake.
    pub storage_timeout_ms: u64,

    /// LED class directories, tried in order.
    pub led_dirs: Vec<PathBuf>,
    pub console_path: PathBuf,
    pub framebuffer_path: PathBuf,
    /// Console tty the framebuffer is bound to.
    pub fbcon_tty: PathBuf,

    pub log_path: PathBuf,
    /// Mirror the event log to the kernel ring buffer.
    pub kmsg_path: Option<PathBuf>,

    /// `/dev/...` path or `PARTUUID=`/`UUID=`/`LABEL=` spec.
    pub root_device: String,
    pub root_fstype: Option<String>,
    pub new_root: PathBuf,
    /// Entry points looked up relative to `new_root`, first match wins.
    pub init_candidates: Vec<PathBuf>,
    pub recovery_shell: String,
    pub degraded_policy: DegradedPolicy,

    pub cmdline_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_device: PathBuf::from("/dev/mmcblk0"),
            throttled_path: PathBuf::from("/sys/devices/platform/soc/soc:firmware/get_throttled"),
            cpuinfo_path: PathBuf::from("/proc/cpuinfo"),
            cpu_sysfs_dir: PathBuf::from("/sys/devices/system/cpu"),
            meminfo_path: PathBuf::from("/proc/meminfo"),
            thermal_path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            min_memory_mib: 128,
            thermal_limit_millic: 80_000,
            supplementary_checks: true,
            check_timeout_ms: 5_000,
            storage_timeout_ms: 10_000,
            led_dirs: vec![
                PathBuf::from("/sys/class/leds/ACT"),
                PathBuf::from("/sys/class/leds/led0"),
            ],
            console_path: PathBuf::from("/dev/console"),
            framebuffer_path: PathBuf::from("/dev/fb0"),
            fbcon_tty: PathBuf::from("/dev/tty1"),
            log_path: PathBuf::from("/run/bootguard.log"),
            kmsg_path: Some(PathBuf::from("/dev/kmsg")),
            root_device: "/dev/mmcblk0p2".to_string(),
            root_fstype: None,
            new_root: PathBuf::from("/newroot"),
            init_candidates: vec![
                PathBuf::from("sbin/init"),
                PathBuf::from("lib/systemd/systemd"),
                PathBuf::from("usr/lib/systemd/systemd"),
            ],
            recovery_shell: "sh".to_string(),
            degraded_policy: DegradedPolicy::Proceed,
            cmdline_path: PathBuf::from("/proc/cmdline"),
        }
    }
}

impl Config {
    /// Load configuration from the filesystem, environment and kernel cmdline.
    pub fn load() -> Self {
        let mut env_vars = HashMap::new();

        let env_file = Path::new(DEFAULT_ENV_FILE);
        if env_file.exists() {
            match dotenvy::from_path_iter(env_file) {
                Ok(iter) => {
                    for item in iter {
                        match item {
                            Ok((key, value)) => {
                                env_vars.insert(key, value);
                            }
                            Err(e) => {
                                eprintln!("  [WARN] Skipping line in {}: {}", env_file.display(), e)
                            }
                        }
                    }
                }
                Err(e) => eprintln!("  [WARN] Cannot read {}: {}", env_file.display(), e),
            }
        }

        // Environment variables override the env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        let json_path = env_vars
            .get("BOOTGUARD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let json = match fs::read_to_string(&json_path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                eprintln!("  [WARN] Cannot read {}: {}", json_path.display(), e);
                None
            }
        };

        let (config, warnings) = Self::from_layers(json.as_deref(), &env_vars, |path| {
            fs::read_to_string(path).ok()
        });
        for warning in warnings {
            eprintln!("  [WARN] config: {}", warning);
        }
        config
    }

    /// Merge the configuration layers.
    ///
    /// `read_cmdline` is called with the effective `cmdline_path` once the
    /// file and environment layers are applied. Returns the config plus one
    /// message per rejected value.
    pub fn from_layers(
        json: Option<&str>,
        env_vars: &HashMap<String, String>,
        read_cmdline: impl FnOnce(&Path) -> Option<String>,
    ) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        let mut config = match json {
            Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
                warnings.push(format!("ignoring config file: {}", e));
                Config::default()
            }),
            None => Config::default(),
        };

        let mut env_keys: Vec<_> = env_vars
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|field| (field, v)))
            .collect();
        env_keys.sort();
        for (field, value) in env_keys {
            if let Err(e) = config.apply_env(field, value) {
                warnings.push(format!("{}{}: {}", ENV_PREFIX, field, e));
            }
        }

        if let Some(cmdline) = read_cmdline(&config.cmdline_path) {
            let args = parse_cmdline(&cmdline);
            config.apply_cmdline(&args, &mut warnings);
        }

        (config, warnings)
    }

    fn apply_env(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "CONFIG" => {}
            "STORAGE_DEVICE" => self.storage_device = PathBuf::from(value),
            "THROTTLED_PATH" => self.throttled_path = PathBuf::from(value),
            "LOG_PATH" => self.log_path = PathBuf::from(value),
            "KMSG_PATH" => {
                self.kmsg_path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            "ROOT_DEVICE" => self.root_device = value.to_string(),
            "ROOT_FSTYPE" => self.root_fstype = Some(value.to_string()),
            "NEW_ROOT" => self.new_root = PathBuf::from(value),
            "RECOVERY_SHELL" => self.recovery_shell = value.to_string(),
            "CMDLINE_PATH" => self.cmdline_path = PathBuf::from(value),
            "LED_DIRS" => {
                self.led_dirs = value
                    .split(':')
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            }
            "CHECK_TIMEOUT_MS" => self.check_timeout_ms = parse_millis(value)?,
            "STORAGE_TIMEOUT_MS" => self.storage_timeout_ms = parse_millis(value)?,
            "SUPPLEMENTARY_CHECKS" => self.supplementary_checks = parse_bool(value)?,
            "DEGRADED_POLICY" => self.degraded_policy = value.parse()?,
            other => return Err(format!("unknown setting '{}'", other)),
        }
        Ok(())
    }

    fn apply_cmdline(&mut self, args: &HashMap<String, String>, warnings: &mut Vec<String>) {
        if let Some(root) = args.get("root") {
            self.root_device = root.clone();
        }
        if let Some(fstype) = args.get("rootfstype") {
            self.root_fstype = Some(fstype.clone());
        }
        if let Some(policy) = args.get("bootguard.policy") {
            match policy.parse() {
                Ok(policy) => self.degraded_policy = policy,
                Err(e) => warnings.push(format!("bootguard.policy: {}", e)),
            }
        }
        if let Some(timeout) = args.get("bootguard.timeout_ms") {
            match parse_millis(timeout) {
                Ok(ms) => self.check_timeout_ms = ms,
                Err(e) => warnings.push(format!("bootguard.timeout_ms: {}", e)),
            }
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  STORAGE_DEVICE: {}", self.storage_device.display());
        println!("  THROTTLED_PATH: {}", self.throttled_path.display());
        println!("  CHECK_TIMEOUT_MS: {}", self.check_timeout_ms);
        println!("  STORAGE_TIMEOUT_MS: {}", self.storage_timeout_ms);
        println!("  SUPPLEMENTARY_CHECKS: {}", self.supplementary_checks);
        let leds: Vec<_> = self.led_dirs.iter().map(|p| p.display().to_string()).collect();
        println!("  LED_DIRS: {}", leds.join(":"));
        println!("  LOG_PATH: {}", self.log_path.display());
        match &self.kmsg_path {
            Some(path) => println!("  KMSG_PATH: {}", path.display()),
            None => println!("  KMSG_PATH: (disabled)"),
        }
        println!("  ROOT_DEVICE: {}", self.root_device);
        println!(
            "  ROOT_FSTYPE: {}",
            self.root_fstype.as_deref().unwrap_or("(auto)")
        );
        println!("  NEW_ROOT: {}", self.new_root.display());
        println!("  RECOVERY_SHELL: {}", self.recovery_shell);
        println!("  DEGRADED_POLICY: {:?}", self.degraded_policy);
    }
}

/// Parse a kernel command line into key/value pairs.
///
/// Tokens without `=` are flags and map to `"1"`. Later duplicates win,
/// which matches how the kernel treats repeated `root=`.
pub fn parse_cmdline(cmdline: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for token in cmdline.split_ascii_whitespace() {
        let (key, value) = match token.split_once('=') {
            Some((k, v)) => (k, v),
            None => (token, "1"),
        };
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), value.to_string());
    }
    map
}

fn parse_millis(value: &str) -> Result<u64, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err("timeout must be greater than zero".to_string()),
        Ok(ms) => Ok(ms),
        Err(_) => Err(format!("'{}' is not a number of milliseconds", value)),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}
