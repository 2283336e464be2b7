//! Bounded execution of external compile/test commands.
//!
//! Commands come from profile configuration as shell strings and run via
//! `sh -c` so pipelines and `&&` chains work. Every failure mode (non-zero
//! exit, timeout, spawn error) is coerced into a `CommandOutcome` with a
//! non-zero exit code and the diagnostic as output; callers never see an
//! unhandled fault from running a command.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// The observed result of one external command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    /// Combined stdout + stderr, or the failure diagnostic.
    pub output: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            output: message.into(),
        }
    }
}

/// Run a shell command with a bounded timeout.
pub async fn run_command(cmd: &str, cwd: &Path, timeout_secs: u64) -> CommandOutcome {
    tracing::debug!(command = cmd, timeout_secs, "running external command");

    let child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => return CommandOutcome::failed(format!("Failed to run '{}': {}", cmd, e)),
    };

    let duration = Duration::from_secs(timeout_secs);
    let output = match timeout(duration, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return CommandOutcome::failed(format!("Failed to wait for '{}': {}", cmd, e));
        }
        Err(_) => {
            return CommandOutcome::failed(format!(
                "Command timed out after {} seconds: {}",
                timeout_secs, cmd
            ));
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    CommandOutcome {
        exit_code: output.status.code().unwrap_or(1),
        output: combined,
    }
}
