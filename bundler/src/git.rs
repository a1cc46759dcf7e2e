//! Typed wrappers around the git and git-lfs invocations.
//!
//! Each method issues exactly one command through the [`CommandExecutor`],
//! always addressing the repository with `git -C <dir>` so no process ever
//! depends on the current directory. Clones from archived mirrors pass
//! `-c protocol.file.allow=always`, which recent git requires for local
//! submodule transport.

use crate::command::{CommandExecutor, stderr_text, stdout_text};
use crate::error::{BundlerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::process::Output;

const ALLOW_FILE_PROTOCOL: [&str; 2] = ["-c", "protocol.file.allow=always"];

/// Git operations bound to one command executor.
#[derive(Clone, Copy)]
pub struct Git<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> Git<'a> {
    /// Wraps an executor.
    #[must_use]
    pub const fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// `git clone --mirror -- <url> <dest>`.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Clone`] if git fails.
    pub fn clone_mirror(&self, url: &str, dest: &Utf8Path) -> Result<()> {
        let output = self.run(&["clone", "--mirror", "--", url, dest.as_str()])?;
        clone_result(url, &output)
    }

    /// Clones an archived mirror into a working tree.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Clone`] if git fails.
    pub fn clone_local(&self, mirror: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        let mut args = ALLOW_FILE_PROTOCOL.to_vec();
        args.extend(["clone", "--", mirror.as_str(), dest.as_str()]);
        let output = self.run(&args)?;
        clone_result(mirror.as_str(), &output)
    }

    /// Lists every LFS-tracked path reachable from any ref.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Lfs`] if git-lfs fails.
    pub fn lfs_files(&self, repo: &Utf8Path) -> Result<Vec<String>> {
        let output = self.run_in(repo, &["lfs", "ls-files", "--all", "--name-only"])?;
        let output = lfs_result("ls-files", output)?;
        Ok(stdout_text(&output)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Downloads every LFS object reachable from any ref.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Lfs`] if git-lfs fails.
    pub fn lfs_fetch_all(&self, repo: &Utf8Path) -> Result<()> {
        let output = self.run_in(repo, &["lfs", "fetch", "--all"])?;
        lfs_result("fetch", output).map(drop)
    }

    /// Replaces LFS pointer files in a working tree with their content.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Lfs`] if git-lfs fails.
    pub fn lfs_checkout(&self, worktree: &Utf8Path) -> Result<()> {
        let output = self.run_in(worktree, &["lfs", "checkout"])?;
        lfs_result("checkout", output).map(drop)
    }

    /// Checks that every LFS object referenced by the working tree is present
    /// and intact.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Lfs`] if the check fails.
    pub fn lfs_fsck(&self, worktree: &Utf8Path) -> Result<()> {
        let output = self.run_in(worktree, &["lfs", "fsck"])?;
        lfs_result("fsck", output).map(drop)
    }

    /// Returns the `git config --list` rendering of `.gitmodules` at HEAD,
    /// or `None` when HEAD has no `.gitmodules`.
    ///
    /// # Errors
    ///
    /// Returns an error only if git cannot be run at all.
    pub fn gitmodules_config(&self, repo: &Utf8Path) -> Result<Option<String>> {
        let output = self.run_in(repo, &["config", "--blob", "HEAD:.gitmodules", "--list"])?;
        Ok(output.status.success().then(|| stdout_text(&output)))
    }

    /// `git remote set-url origin <url>`.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Git`] if git fails.
    pub fn set_origin(&self, repo: &Utf8Path, url: &str) -> Result<()> {
        self.checked_in(repo, "remote set-url", &["remote", "set-url", "origin", url])
            .map(drop)
    }

    /// Sets a key in the repository's local configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Git`] if git fails.
    pub fn set_config(&self, repo: &Utf8Path, key: &str, value: &str) -> Result<()> {
        self.checked_in(repo, "config", &["config", key, value])
            .map(drop)
    }

    /// Initialises and checks out one submodule.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Git`] if git fails.
    pub fn submodule_update(&self, worktree: &Utf8Path, path: &str) -> Result<()> {
        let mut args = ALLOW_FILE_PROTOCOL.to_vec();
        args.extend([
            "-C",
            worktree.as_str(),
            "submodule",
            "update",
            "--init",
            "--",
            path,
        ]);
        let output = self.run(&args)?;
        checked("submodule update", output).map(drop)
    }

    /// Returns `git submodule status --recursive` output.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Git`] if git fails.
    pub fn submodule_status(&self, worktree: &Utf8Path) -> Result<Vec<SubmoduleStatus>> {
        let output = self.checked_in(
            worktree,
            "submodule status",
            &["submodule", "status", "--recursive"],
        )?;
        Ok(parse_submodule_status(&stdout_text(&output)))
    }

    /// Returns the absolute git directory of a working tree.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Git`] if git fails.
    pub fn absolute_git_dir(&self, worktree: &Utf8Path) -> Result<Utf8PathBuf> {
        let output = self.checked_in(worktree, "rev-parse", &["rev-parse", "--absolute-git-dir"])?;
        Ok(Utf8PathBuf::from(stdout_text(&output).trim()))
    }

    /// `git fsck --full`.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Git`] if the repository is corrupt.
    pub fn fsck(&self, repo: &Utf8Path) -> Result<()> {
        self.checked_in(repo, "fsck", &["fsck", "--full"]).map(drop)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        self.executor.run("git", args)
    }

    fn run_in(&self, dir: &Utf8Path, args: &[&str]) -> Result<Output> {
        let mut full = vec!["-C", dir.as_str()];
        full.extend_from_slice(args);
        self.run(&full)
    }

    fn checked_in(&self, dir: &Utf8Path, operation: &'static str, args: &[&str]) -> Result<Output> {
        checked(operation, self.run_in(dir, args)?)
    }
}

fn checked(operation: &'static str, output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(BundlerError::Git {
            operation,
            message: stderr_text(&output),
        })
    }
}

fn lfs_result(operation: &'static str, output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(BundlerError::Lfs {
            operation,
            message: stderr_text(&output),
        })
    }
}

fn clone_result(url: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(BundlerError::Clone {
            url: url.to_owned(),
            message: stderr_text(output),
        })
    }
}

/// State prefix of a `git submodule status` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleState {
    /// Checked out at the recorded commit.
    Current,
    /// Not initialised (`-`).
    Uninitialized,
    /// Checked out at a different commit (`+`).
    Modified,
    /// Has merge conflicts (`U`).
    Conflicted,
}

/// One line of `git submodule status` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleStatus {
    /// Parsed state prefix.
    pub state: SubmoduleState,
    /// Path relative to the top-level working tree.
    pub path: String,
}

/// Parses `git submodule status` output, skipping unrecognised lines.
///
/// # Examples
///
/// ```
/// use git_bundler::git::{SubmoduleState, parse_submodule_status};
///
/// let status = parse_submodule_status("-1234abcd vendor/lib\n");
/// assert_eq!(status[0].state, SubmoduleState::Uninitialized);
/// assert_eq!(status[0].path, "vendor/lib");
/// ```
#[must_use]
pub fn parse_submodule_status(text: &str) -> Vec<SubmoduleStatus> {
    text.lines()
        .filter_map(|line| {
            let mut chars = line.chars();
            let state = match chars.next()? {
                ' ' => SubmoduleState::Current,
                '-' => SubmoduleState::Uninitialized,
                '+' => SubmoduleState::Modified,
                'U' => SubmoduleState::Conflicted,
                _ => return None,
            };
            let (_sha, rest) = chars.as_str().split_once(' ')?;
            let path = rest.rsplit_once(" (").map_or(rest, |(path, _)| path);
            Some(SubmoduleStatus {
                state,
                path: path.to_owned(),
            })
        })
        .collect()
}
