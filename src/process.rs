//! External command execution with consistent error handling.
//!
//! The pre-root environment has no mount library, only the userland the
//! packager puts next to us (`mount`, `umount`, `findfs`, `switch_root`,
//! `sh`). Everything goes through [`Cmd`] so stderr is always captured and
//! ends up in the error message.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Search path for when the kernel started us without one.
pub const DEFAULT_PATH: &str = "/sbin:/bin:/usr/sbin:/usr/bin";

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
    error_prefix: Option<String>,
}

impl Cmd {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            allow_fail: false,
            error_prefix: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        let program = find_program(&self.program).unwrap_or_else(|| PathBuf::from(&self.program));
        let output = Command::new(&program)
            .args(&self.args)
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is it in the initramfs?", self.program))?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !self.allow_fail && !result.success() {
            let prefix = self
                .error_prefix
                .unwrap_or_else(|| format!("'{}' failed", self.program));

            let stderr = result.stderr_trimmed();
            if stderr.is_empty() {
                bail!("{} (exit code {})", prefix, result.code());
            } else {
                bail!("{} (exit code {}): {}", prefix, result.code(), stderr);
            }
        }

        Ok(result)
    }
}

/// Set `PATH` to [`DEFAULT_PATH`] if it is unset or empty.
///
/// Only call this while no other thread is running.
pub fn ensure_path() {
    let missing = env::var_os("PATH").map_or(true, |p| p.is_empty());
    if missing {
        env::set_var("PATH", DEFAULT_PATH);
    }
}

/// Locate a program in PATH, falling back to [`DEFAULT_PATH`] when PATH is
/// unset or does not have it (the kernel starts init with an empty
/// environment).
pub fn find_program(program: &str) -> Option<PathBuf> {
    if let Ok(path) = which::which(program) {
        return Some(path);
    }
    search_default_path(program)
}

fn search_default_path(program: &str) -> Option<PathBuf> {
    DEFAULT_PATH
        .split(':')
        .map(|dir| Path::new(dir).join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_run_success() {
        let result = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello");
    }

    #[test]
    fn test_run_failure_includes_stderr() {
        let err = Cmd::new("ls")
            .arg("/nonexistent_path_12345")
            .run()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No such file") || msg.contains("cannot access"));
    }

    #[test]
    fn test_custom_error_message() {
        let err = Cmd::new("false")
            .error_msg("mount of /newroot failed")
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("mount of /newroot failed"));
    }

    #[test]
    fn test_allow_fail() {
        let result = Cmd::new("false").allow_fail().run().unwrap();
        assert!(!result.success());
        assert_eq!(result.code(), 1);
    }

    #[test]
    fn test_args_and_paths() {
        let result = Cmd::new("echo")
            .args(["-n", "a"])
            .arg_path(Path::new("/b"))
            .run()
            .unwrap();
        assert_eq!(result.stdout, "a /b");
    }

    #[test]
    fn test_find_program() {
        assert!(find_program("sh").is_some());
        assert!(find_program("nonexistent_program_12345").is_none());
    }

    #[test]
    fn test_default_path_covers_sbin() {
        assert!(DEFAULT_PATH.split(':').any(|dir| dir == "/sbin"));
        assert!(search_default_path("sh").is_some());
        assert!(search_default_path("nonexistent_program_12345").is_none());
    }

    #[test]
    #[serial]
    fn test_runs_without_path() {
        let saved = env::var_os("PATH");
        env::remove_var("PATH");
        let result = Cmd::new("sh").args(["-c", "echo ok"]).run();
        ensure_path();
        let restored = env::var("PATH");
        if let Some(path) = saved {
            env::set_var("PATH", path);
        }

        assert_eq!(result.unwrap().stdout_trimmed(), "ok");
        assert_eq!(restored.unwrap(), DEFAULT_PATH);
    }

    #[test]
    fn test_missing_program_is_an_error() {
        assert!(Cmd::new("nonexistent_program_12345").run().is_err());
    }
}
