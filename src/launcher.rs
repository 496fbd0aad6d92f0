//! Fire-and-forget program launching.

use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

pub trait Launcher {
    /// Start `command` detached from the window manager. Failures are logged,
    /// never returned.
    fn launch(&self, command: &str);
}

/// Spawns real processes in their own session
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    fn spawn(command: &str) -> std::io::Result<Child> {
        let mut cmd = Command::new(command);
        cmd.stdin(Stdio::null()).stdout(Stdio::null());
        // Own session, so the program outlives us and doesn't share our
        // controlling terminal
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
        cmd.spawn()
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, command: &str) {
        match Self::spawn(command) {
            Ok(mut child) => {
                log::info!("Launched '{}' (pid {})", command, child.id());
                // Reap off the event thread so no zombie is left behind
                let name = command.to_string();
                std::thread::spawn(move || match child.wait() {
                    Ok(status) => log::debug!("'{}' exited with {}", name, status),
                    Err(e) => log::warn!("Failed to wait for '{}': {}", name, e),
                });
            }
            Err(e) => log::error!("Failed to launch '{}': {}", command, e),
        }
    }
}
