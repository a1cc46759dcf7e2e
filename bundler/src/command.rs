//! External command execution.
//!
//! Every git and git-lfs invocation goes through [`CommandExecutor`], so the
//! orchestration code can be exercised against stubs in tests. The system
//! implementation enforces a timeout and keeps child processes away from the
//! terminal and from LFS smudge downloads.

use crate::error::{BundlerError, Result};
use log::debug;
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for a single external command (one hour).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3_600);

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// A non-zero exit status is not an error at this level; callers decide
    /// whether to tolerate it.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, or [`BundlerError::Git`] when the command times out.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use git_bundler::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("git", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), git_bundler::error::BundlerError>(())
    /// ```
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output>;
}

/// Executes commands on the host system.
///
/// Children inherit the environment plus `GIT_LFS_SKIP_SMUDGE=1` (clones
/// never download LFS content on their own; the bundler materialises LFS
/// files explicitly) and `GIT_TERMINAL_PROMPT=0` (an unreachable URL fails
/// instead of blocking on a credential prompt).
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Creates an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the configured per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output> {
        debug!("[cmd] {cmd} {}", args.join(" "));

        let mut child = Command::new(cmd)
            .args(args)
            .env("GIT_LFS_SKIP_SMUDGE", "1")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes while waiting so a chatty child cannot fill a pipe
        // buffer and stall before the timeout fires.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(self.timeout)? {
            Some(status) => Ok(Output {
                status,
                stdout: join_drain(stdout)?,
                stderr: join_drain(stderr)?,
            }),
            None => {
                kill_quietly(&mut child);
                Err(BundlerError::Git {
                    operation: "command",
                    message: format!(
                        "`{cmd} {}` timed out after {} seconds",
                        args.join(" "),
                        self.timeout.as_secs()
                    ),
                })
            }
        }
    }
}

type DrainHandle = Option<JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> DrainHandle {
    pipe.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
    })
}

fn join_drain(handle: DrainHandle) -> Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| BundlerError::Io(std::io::Error::other("output reader panicked")))?
            .map_err(BundlerError::from),
        None => Ok(Vec::new()),
    }
}

fn kill_quietly(child: &mut Child) {
    if child.kill().is_err() {
        // The process may already have exited.
    }
    if child.wait().is_err() {
        // Nothing left to reap.
    }
}

/// Returns the trimmed, lossily decoded stderr of a command.
#[must_use]
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_owned()
}

/// Returns the lossily decoded stdout of a command.
#[must_use]
pub fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
