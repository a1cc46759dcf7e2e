//! Pre-flight checks for the external tools the bundler drives.
//!
//! Every operation needs `git`. Archiving additionally needs `git-lfs`,
//! because whether a repository uses LFS is only known after cloning it.

use crate::command::CommandExecutor;
use crate::error::{BundlerError, Result};

/// Availability of the external tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    /// Whether `git` is installed.
    pub git: bool,
    /// Whether the `git lfs` extension is installed.
    pub git_lfs: bool,
}

impl ToolStatus {
    /// Returns the first tool required by the operation that is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use git_bundler::deps::ToolStatus;
    ///
    /// let status = ToolStatus { git: true, git_lfs: false };
    /// assert_eq!(status.first_missing(false), None);
    /// assert_eq!(status.first_missing(true), Some("git-lfs"));
    /// ```
    #[must_use]
    pub const fn first_missing(&self, require_lfs: bool) -> Option<&'static str> {
        if !self.git {
            Some("git")
        } else if require_lfs && !self.git_lfs {
            Some("git-lfs")
        } else {
            None
        }
    }
}

/// Checks which of the external tools are installed.
#[must_use]
pub fn check_tools(executor: &dyn CommandExecutor) -> ToolStatus {
    let git = command_succeeds(executor, "git", &["--version"]);
    let git_lfs = git && command_succeeds(executor, "git", &["lfs", "version"]);
    ToolStatus { git, git_lfs }
}

/// Fails unless every tool the operation needs is installed.
///
/// # Errors
///
/// Returns [`BundlerError::DependencyMissing`] naming the first missing
/// tool.
pub fn ensure_tools(executor: &dyn CommandExecutor, require_lfs: bool) -> Result<()> {
    match check_tools(executor).first_missing(require_lfs) {
        Some(tool) => Err(BundlerError::DependencyMissing { tool }),
        None => Ok(()),
    }
}

/// Returns true if the given command executes successfully.
fn command_succeeds(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> bool {
    executor.run(cmd, args).is_ok_and(|o| o.status.success())
}
