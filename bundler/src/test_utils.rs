//! Shared test utilities for the bundler crate.

use crate::command::CommandExecutor;
use crate::error::{BundlerError, Result};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    stdout_output("")
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "git").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let Some(call) = expected.pop_front() else {
            return Err(BundlerError::StubMismatch {
                message: format!("unexpected invocation: {cmd} {}", args.join(" ")),
            });
        };

        if call.cmd != cmd || call.args.as_slice() != args {
            return Err(BundlerError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{cmd} {}`",
                    call.cmd,
                    call.args.join(" "),
                    args.join(" ")
                ),
            });
        }

        call.result
    }
}

/// A repository served by [`FakeGit`].
#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
    gitmodules: Option<String>,
    lfs_files: Vec<String>,
    lfs_fetch_fails: bool,
}

impl FakeRepo {
    /// Creates a repository with no submodules and no LFS content.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `git config --list` rendering of `.gitmodules` at HEAD.
    #[must_use]
    pub fn with_gitmodules(mut self, config_list: &str) -> Self {
        self.gitmodules = Some(config_list.to_owned());
        self
    }

    /// Marks the given paths as LFS-tracked.
    #[must_use]
    pub fn with_lfs_files(mut self, files: &[&str]) -> Self {
        self.lfs_files = files.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    /// Makes `git lfs fetch --all` fail for this repository.
    #[must_use]
    pub fn with_failing_lfs_fetch(mut self) -> Self {
        self.lfs_fetch_fails = true;
        self
    }
}

/// A scripted git host answering the commands issued while archiving.
///
/// Mirror clones create the destination directory and remember which URL it
/// came from, so later `git -C <dir> ...` calls are answered from the
/// matching [`FakeRepo`]. URLs without a registered repository fail to clone.
#[derive(Debug, Default)]
pub struct FakeGit {
    repos: HashMap<String, FakeRepo>,
    clones: RefCell<HashMap<String, String>>,
    calls: RefCell<Vec<String>>,
    lfs_missing: bool,
}

impl FakeGit {
    /// Creates a host with no repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a repository reachable at `url`.
    #[must_use]
    pub fn with_repo(mut self, url: &str, repo: FakeRepo) -> Self {
        self.repos.insert(url.to_owned(), repo);
        self
    }

    /// Simulates a host without git-lfs installed.
    #[must_use]
    pub fn without_lfs(mut self) -> Self {
        self.lfs_missing = true;
        self
    }

    /// Returns every invocation seen so far, rendered as `cmd arg arg ...`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Returns how many times `url` was mirror-cloned.
    #[must_use]
    pub fn clone_count(&self, url: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with("git clone --mirror") && call.contains(url))
            .count()
    }

    fn mirror_clone(&self, url: &str, dest: &str) -> Result<Output> {
        if !self.repos.contains_key(url) {
            return Ok(failure_output(&format!(
                "fatal: repository '{url}' does not exist"
            )));
        }
        std::fs::create_dir_all(dest)?;
        std::fs::write(Path::new(dest).join("HEAD"), "ref: refs/heads/main\n")?;
        self.clones
            .borrow_mut()
            .insert(dest.to_owned(), url.to_owned());
        Ok(success_output())
    }

    fn in_repo(&self, dir: &str, rest: &[&str]) -> Result<Output> {
        let url = self.clones.borrow().get(dir).cloned();
        let Some(repo) = url.as_deref().and_then(|u| self.repos.get(u)) else {
            return Ok(failure_output(&format!("fatal: not a git repository: {dir}")));
        };

        match rest {
            ["lfs", "ls-files", "--all", "--name-only"] => {
                if self.lfs_missing {
                    return Ok(failure_output("git: 'lfs' is not a git command"));
                }
                let mut listing = repo.lfs_files.join("\n");
                if !listing.is_empty() {
                    listing.push('\n');
                }
                Ok(stdout_output(&listing))
            }
            ["lfs", "fetch", "--all"] => {
                if repo.lfs_fetch_fails {
                    return Ok(failure_output("batch request: missing protocol"));
                }
                let objects = Path::new(dir).join("lfs").join("objects").join("ab").join("cd");
                std::fs::create_dir_all(&objects)?;
                for (index, file) in repo.lfs_files.iter().enumerate() {
                    std::fs::write(objects.join(format!("abcd{index:060}")), file)?;
                }
                Ok(success_output())
            }
            ["config", "--blob", "HEAD:.gitmodules", "--list"] => match &repo.gitmodules {
                Some(text) => Ok(stdout_output(text)),
                None => Ok(failure_output("fatal: unable to resolve 'HEAD:.gitmodules'")),
            },
            _ => Ok(failure_output("unsupported by FakeGit")),
        }
    }
}

impl CommandExecutor for FakeGit {
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output> {
        self.calls
            .borrow_mut()
            .push(format!("{cmd} {}", args.join(" ")));

        if cmd != "git" {
            return Ok(failure_output(&format!("{cmd}: command not found")));
        }

        match args {
            ["--version"] => Ok(stdout_output("git version 2.45.0\n")),
            ["lfs", "version"] if !self.lfs_missing => Ok(stdout_output("git-lfs/3.5.1\n")),
            ["clone", "--mirror", "--", url, dest] => self.mirror_clone(url, dest),
            ["-C", dir, rest @ ..] => self.in_repo(dir, rest),
            _ => Ok(failure_output("unsupported by FakeGit")),
        }
    }
}

/// An executor that accepts every git invocation and records it.
///
/// Clones create their destination directory, `submodule update` creates the
/// submodule path, and `rev-parse --absolute-git-dir` reports `<dir>/.git`,
/// which is enough filesystem state for restore orchestration to proceed.
/// Invocations whose rendering contains a registered pattern fail.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    failures: Vec<String>,
    submodule_status: String,
    calls: RefCell<Vec<String>>,
}

impl RecordingExecutor {
    /// Creates an executor on which every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every invocation containing `pattern` fail.
    #[must_use]
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_owned());
        self
    }

    /// Sets the output of `git submodule status`.
    #[must_use]
    pub fn with_submodule_status(mut self, status: &str) -> Self {
        self.submodule_status = status.to_owned();
        self
    }

    /// Returns every invocation seen so far, rendered as `cmd arg arg ...`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Returns the recorded invocations containing `pattern`.
    #[must_use]
    pub fn calls_containing(&self, pattern: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.contains(pattern))
            .cloned()
            .collect()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output> {
        let rendered = format!("{cmd} {}", args.join(" "));
        self.calls.borrow_mut().push(rendered.clone());

        if self.failures.iter().any(|pattern| rendered.contains(pattern)) {
            return Ok(failure_output(&format!("scripted failure: {rendered}")));
        }

        let dir = match args {
            ["-C", dir, ..] => Some(*dir),
            _ => None,
        };
        let git_args = match args {
            ["-c", _, "-C", _, rest @ ..] | ["-C", _, rest @ ..] | ["-c", _, rest @ ..] => rest,
            rest => rest,
        };

        match git_args {
            ["clone", .., dest] => {
                std::fs::create_dir_all(Path::new(dest).join(".git"))?;
                Ok(success_output())
            }
            ["submodule", "update", "--init", "--", path] => {
                let worktree = args.get(3).copied().unwrap_or_default();
                std::fs::create_dir_all(Path::new(worktree).join(path))?;
                Ok(success_output())
            }
            ["submodule", "status", ..] => Ok(stdout_output(&self.submodule_status)),
            ["rev-parse", "--absolute-git-dir"] => Ok(stdout_output(&format!(
                "{}/.git\n",
                dir.unwrap_or_default()
            ))),
            _ => Ok(success_output()),
        }
    }
}
