//! Scoped temporary workspaces.
//!
//! Archiving, unpacking and verifying all stage data in a temporary
//! directory that must disappear on every exit path, including early
//! returns through `?` and panics. [`ScopedWorkspace`] wraps
//! [`tempfile::TempDir`] and exposes its path as UTF-8.

use crate::error::{BundlerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Prefix of every workspace directory created in the system temp dir.
pub const WORKSPACE_PREFIX: &str = "git-bundler-";

/// A temporary directory removed when dropped.
#[derive(Debug)]
pub struct ScopedWorkspace {
    dir: TempDir,
    path: Utf8PathBuf,
}

impl ScopedWorkspace {
    /// Creates a fresh workspace in the system temp directory.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Io`] if the directory cannot be created and
    /// [`BundlerError::NonUtf8Path`] if its path is not UTF-8.
    pub fn new() -> Result<Self> {
        Self::new_in(&utf8_path(&std::env::temp_dir())?)
    }

    /// Creates a fresh workspace below `parent`.
    fn new_in(parent: &Utf8Path) -> Result<Self> {
        Self::from_dir(
            tempfile::Builder::new()
                .prefix(WORKSPACE_PREFIX)
                .tempdir_in(parent)?,
        )
    }

    fn from_dir(dir: TempDir) -> Result<Self> {
        let path = utf8_path(dir.path())?;
        debug!("created workspace {path}");
        Ok(Self { dir, path })
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Removes the workspace now, reporting any failure.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Io`] if the directory cannot be removed.
    pub fn close(self) -> Result<()> {
        Ok(self.dir.close()?)
    }
}

/// Converts a filesystem path into a UTF-8 path.
///
/// # Errors
///
/// Returns [`BundlerError::NonUtf8Path`] if `path` is not valid UTF-8.
pub fn utf8_path(path: &Path) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|path| BundlerError::NonUtf8Path { path })
}

/// Removes workspace directories in the system temp dir older than
/// `max_age`, left behind by interrupted runs.
///
/// Returns the number of directories removed. Entries that cannot be
/// inspected or removed are skipped.
#[must_use]
pub fn sweep_stale_workspaces(max_age: Duration) -> usize {
    sweep_stale_workspaces_in(&std::env::temp_dir(), max_age, SystemTime::now())
}

fn sweep_stale_workspaces_in(temp_root: &Path, max_age: Duration, now: SystemTime) -> usize {
    let Ok(entries) = std::fs::read_dir(temp_root) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(WORKSPACE_PREFIX) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let is_stale = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > max_age);
        if !metadata.is_dir() || !is_stale {
            continue;
        }
        if std::fs::remove_dir_all(entry.path()).is_ok() {
            debug!("removed stale workspace {}", entry.path().display());
            removed += 1;
        }
    }
    removed
}
