//! CLI argument definitions for the git bundler.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::archiver::ArchiveRequest;
use crate::command::DEFAULT_TIMEOUT;
use crate::manifest::Compression;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::time::Duration;

/// Archive, restore and verify complete git repositories.
#[derive(Parser, Debug)]
#[command(name = "git-bundler")]
#[command(version, about)]
#[command(long_about = concat!(
    "Archive, restore and verify complete git repositories.\n\n",
    "An archive is a single compressed tar holding a mirror clone with every ",
    "ref, the LFS object store, and every submodule archived recursively. ",
    "Restoring an archive needs no access to the original hosts.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Archive a repository with its submodules and verify the result:\n",
    "    $ git-bundler archive https://host.example/group/app.git --verify\n\n",
    "  Restore an archive into ./restored/app:\n",
    "    $ git-bundler unpack app_20260101_120000.tar.zst --dest restored\n\n",
    "  Check an existing archive:\n",
    "    $ git-bundler verify app_20260101_120000.tar.zst",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Per-command timeout for git invocations, in seconds.
    #[arg(long, value_name = "SECS", global = true, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,
}

impl Cli {
    /// Returns the log level selected by `-v` and `-q`.
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbosity {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Returns the per-command timeout.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Archive a repository, its LFS objects and its submodules.
    Archive(ArchiveArgs),

    /// Restore a repository from an archive.
    Unpack(UnpackArgs),

    /// Check the integrity of an archive.
    Verify(VerifyArgs),
}

/// Arguments for the archive command.
#[derive(Parser, Debug, Clone)]
pub struct ArchiveArgs {
    /// URL or local path of the repository to archive.
    #[arg(value_name = "SOURCE_URL")]
    pub source_url: String,

    /// Directory receiving the archive.
    #[arg(short, long = "out", value_name = "DIR", default_value = ".")]
    pub output_dir: Utf8PathBuf,

    /// Compression of the archive.
    #[arg(short, long = "compress", value_enum, default_value_t = Compression::Zstd)]
    pub compression: Compression,

    /// Verify the archive after writing it.
    #[arg(long)]
    pub verify: bool,
}

impl ArchiveArgs {
    /// Converts the arguments into an archive request.
    #[must_use]
    pub fn to_request(&self) -> ArchiveRequest {
        ArchiveRequest {
            source_url: self.source_url.clone(),
            output_dir: self.output_dir.clone(),
            compression: self.compression,
            verify_after: self.verify,
        }
    }
}

/// Arguments for the unpack command.
#[derive(Parser, Debug, Clone)]
pub struct UnpackArgs {
    /// Archive to restore.
    #[arg(value_name = "ARCHIVE")]
    pub archive: Utf8PathBuf,

    /// Directory receiving the repository [default: ./<archive name>].
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<Utf8PathBuf>,
}

impl UnpackArgs {
    /// Returns the destination directory, derived from the archive file
    /// name when `--dest` is not given.
    #[must_use]
    pub fn destination(&self) -> Utf8PathBuf {
        self.dest
            .clone()
            .unwrap_or_else(|| default_destination(&self.archive))
    }
}

/// Arguments for the verify command.
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Archive to check.
    #[arg(value_name = "ARCHIVE")]
    pub archive: Utf8PathBuf,
}

/// Returns the archive file name up to its first dot, as a path relative to
/// the working directory.
///
/// # Examples
///
/// ```
/// use camino::{Utf8Path, Utf8PathBuf};
/// use git_bundler::cli::default_destination;
///
/// assert_eq!(
///     default_destination(Utf8Path::new("/backups/app_20260101_120000.tar.zst")),
///     Utf8PathBuf::from("app_20260101_120000")
/// );
/// ```
#[must_use]
pub fn default_destination(archive: &Utf8Path) -> Utf8PathBuf {
    let stem = archive
        .file_name()
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(crate::url::PLACEHOLDER_REPO_NAME);
    Utf8PathBuf::from(stem)
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
