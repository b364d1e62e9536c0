//! Interactive fallback when handoff is refused or fails.

use std::os::unix::process::CommandExt;
use std::process::Command;
use std::thread;
use std::time::Duration;

use crate::process::{find_program, DEFAULT_PATH};

/// Replace this process with `shell`. Never returns: if the shell cannot be
/// started, park instead of exiting so PID 1 does not die.
pub fn enter_shell(shell: &str, reason: &str) -> ! {
    eprintln!();
    eprintln!("bootguard: {}", reason);
    eprintln!("bootguard: starting recovery shell");

    match find_program(shell) {
        Some(path) => {
            let err = Command::new(&path)
                .env("PATH", std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string()))
                .exec();
            eprintln!("  [WARN] cannot exec {}: {}", path.display(), err);
        }
        None => eprintln!("  [WARN] recovery shell '{}' not found", shell),
    }

    park()
}

/// Sleep forever.
pub fn park() -> ! {
    eprintln!("bootguard: system halted, power-cycle to retry");
    loop {
        thread::sleep(Duration::from_secs(3600));
    }
}
