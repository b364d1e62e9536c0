//! CPU check: at least one processor core is enumerable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::WalkDir;

use super::{CheckSpec, Severity};

pub const ID: &str = "cpu";

pub fn spec(cpuinfo: PathBuf, sysfs_dir: PathBuf, timeout: Duration) -> CheckSpec {
    CheckSpec::new(ID, Severity::Critical, timeout, move || {
        probe(&cpuinfo, &sysfs_dir)
    })
}

/// Count cores from `cpuinfo`, falling back to `cpuN` directories in sysfs.
pub fn probe(cpuinfo: &Path, sysfs_dir: &Path) -> Result<String, String> {
    let text = fs::read_to_string(cpuinfo);

    if let Ok(text) = &text {
        let cores = count_processors(text);
        if cores > 0 {
            return Ok(match model_name(text) {
                Some(model) => format!("{} core(s), {}", cores, model),
                None => format!("{} core(s)", cores),
            });
        }
    }

    let cores = count_sysfs_cpus(sysfs_dir);
    if cores > 0 {
        return Ok(format!("{} core(s) listed in {}", cores, sysfs_dir.display()));
    }

    match text {
        Err(e) => Err(format!(
            "cannot read {} ({}) and no cores under {}",
            cpuinfo.display(),
            e,
            sysfs_dir.display()
        )),
        Ok(_) => Err("no processor cores reported".to_string()),
    }
}

/// Number of `processor : N` entries.
pub fn count_processors(cpuinfo: &str) -> usize {
    cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim() == "processor")
        .count()
}

/// Board or CPU model, whichever the kernel reports.
fn model_name(cpuinfo: &str) -> Option<String> {
    ["Model", "model name", "Hardware"].iter().find_map(|wanted| {
        cpuinfo
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim() == *wanted)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Number of `cpuN` directories directly under `dir`.
pub fn count_sysfs_cpus(dir: &Path) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name.strip_prefix("cpu")
                .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false)
        })
        .count()
}
