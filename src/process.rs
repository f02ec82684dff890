//! # External `hg` Invocation
//!
//! This module is the single point of contact with the Mercurial binary.
//! Everything else in the crate treats the VCS as an opaque oracle reachable
//! through the [`HgRunner`] trait:
//!
//! - **`HgRunner`**: the trait seam. `execute` spawns the binary and captures
//!   its output without judging the exit code; the provided `run` wrapper
//!   adds the probe-vs-raising behavior every caller wants. Keeping the
//!   raising logic in the trait means test doubles only have to supply
//!   canned outputs.
//!
//! - **`SystemHg`**: the production implementation, driving the real binary
//!   via `std::process::Command` with a configurable timeout. An `hg` call
//!   that hangs on a dead remote would otherwise hang the whole deploy, so
//!   expiry kills the child and surfaces as a command failure that callers
//!   wrap into a sync failure.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

/// Poll interval while waiting for a child process to finish.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Captured output of one `hg` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the command exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for running `hg` commands - allows mocking in tests
pub trait HgRunner: Send + Sync {
    /// Spawn the binary with the given argument vector and optional working
    /// directory, capturing stdout and stderr.
    ///
    /// A nonzero exit code is not an error at this level; only failures to
    /// run the binary at all (spawn errors, timeouts) are.
    fn execute(&self, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput>;

    /// Run a command with the probe-vs-raising contract.
    ///
    /// With `probe = true` a nonzero exit is returned as-is for the caller to
    /// inspect (used for existence and resolvability checks). With
    /// `probe = false` it becomes an [`Error::Command`] carrying the
    /// attempted command line and captured stderr.
    fn run(&self, args: &[&str], cwd: Option<&Path>, probe: bool) -> Result<CommandOutput> {
        let output = self.execute(args, cwd)?;
        if !probe && !output.success() {
            return Err(Error::Command {
                command: format!("hg {}", args.join(" ")),
                status: format!("exit code {}", output.exit_code),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// The default [`HgRunner`], executing the system `hg` binary.
pub struct SystemHg {
    binary: String,
    timeout: Duration,
}

impl SystemHg {
    /// Default time budget for a single `hg` invocation.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Default for SystemHg {
    fn default() -> Self {
        Self::new("hg", Self::DEFAULT_TIMEOUT)
    }
}

impl HgRunner for SystemHg {
    fn execute(&self, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
        let command_line = format!("{} {}", self.binary, args.join(" "));
        debug!("executing {}", command_line);

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| Error::Command {
            command: command_line.clone(),
            status: "spawn failure".to_string(),
            stderr: e.to_string(),
        })?;

        // Drain the pipes on background threads so a chatty command cannot
        // deadlock against a full pipe buffer while we wait on it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Command {
                    command: command_line,
                    status: format!("timeout after {}s", self.timeout.as_secs()),
                    stderr: String::new(),
                });
            }
            thread::sleep(WAIT_POLL);
        };

        Ok(CommandOutput {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_success() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(output.success());

        let output = CommandOutput {
            exit_code: 255,
            ..output
        };
        assert!(!output.success());
    }

    #[test]
    fn test_execute_captures_stdout_stderr_and_exit_code() {
        // Use the shell as a stand-in binary so the test does not need hg.
        let runner = SystemHg::new("sh", Duration::from_secs(5));
        let output = runner
            .execute(&["-c", "echo out; echo err >&2; exit 3"], None)
            .unwrap();

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[test]
    fn test_run_probe_returns_failure_output() {
        let runner = SystemHg::new("sh", Duration::from_secs(5));
        let output = runner.run(&["-c", "exit 7"], None, true).unwrap();
        assert_eq!(output.exit_code, 7);
    }

    #[test]
    fn test_run_without_probe_raises_on_nonzero_exit() {
        let runner = SystemHg::new("sh", Duration::from_secs(5));
        let err = runner
            .run(&["-c", "echo broken >&2; exit 1"], None, false)
            .unwrap_err();
        let display = format!("{}", err);
        assert!(display.contains("exit code 1"));
        assert!(display.contains("broken"));
    }

    #[test]
    fn test_execute_spawn_failure() {
        let runner = SystemHg::new("hg-deploy-no-such-binary", Duration::from_secs(5));
        let err = runner.execute(&["branches"], None).unwrap_err();
        assert!(format!("{}", err).contains("spawn failure"));
    }

    #[test]
    fn test_execute_times_out() {
        let runner = SystemHg::new("sh", Duration::from_millis(100));
        let err = runner.execute(&["-c", "sleep 5"], None).unwrap_err();
        assert!(format!("{}", err).contains("timeout after 0s"));
    }
}
