//! Repository reconstruction from an archive.
//!
//! The top-level working tree is cloned from the archived mirror and placed
//! at `<dest>/<repo_name>`. Everything after that clone is best-effort: a
//! submodule or LFS store that cannot be restored produces a [`Warning`]
//! and restoration carries on with its siblings.

use crate::command::CommandExecutor;
use crate::error::{ArchiveError, BundlerError, Result};
use crate::extraction::extract_container;
use crate::git::Git;
use crate::layout::{LFS_DIRNAME, MANIFEST_FILENAME, REPOSITORY_DIRNAME, submodule_container};
use crate::manifest::{ArchiveManifest, SubmoduleRecord, read_manifest};
use crate::warning::Warning;
use crate::workspace::ScopedWorkspace;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

/// Result of a successful unpack.
#[derive(Debug)]
pub struct UnpackOutcome {
    /// Path of the restored working tree.
    pub repository: Utf8PathBuf,
    /// Manifest of the top-level container.
    pub manifest: ArchiveManifest,
    /// Non-fatal problems encountered while restoring.
    pub warnings: Vec<Warning>,
}

/// Restores working trees from archive containers.
pub struct Unpacker<'a> {
    git: Git<'a>,
}

impl<'a> Unpacker<'a> {
    /// Creates an unpacker issuing git commands through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            git: Git::new(executor),
        }
    }

    /// Restores the archive at `archive` into `dest_dir/<repo_name>`.
    ///
    /// `dest_dir` is created when absent and must otherwise be an empty
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotFound`] for a missing archive,
    /// [`ArchiveError::DestinationNotEmpty`] for an occupied destination,
    /// [`ArchiveError::Extraction`] for an unreadable artifact, the errors of
    /// [`Unpacker::restore_extracted`], and I/O errors.
    pub fn unpack(&self, archive: &Utf8Path, dest_dir: &Utf8Path) -> Result<UnpackOutcome> {
        if !archive.is_file() {
            return Err(ArchiveError::NotFound {
                path: archive.to_owned(),
            }
            .into());
        }
        prepare_destination(dest_dir)?;

        let workspace = ScopedWorkspace::new()?;
        info!("extracting {archive}");
        extract_container(archive, workspace.path()).map_err(ArchiveError::from)?;
        self.restore_extracted(workspace.path(), dest_dir)
    }

    /// Restores an already extracted container into `dest_dir/<repo_name>`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MissingManifest`] or
    /// [`ArchiveError::MissingRepositoryData`] for incomplete containers,
    /// [`BundlerError::Manifest`] for an unreadable or incompatible manifest,
    /// and [`BundlerError::Clone`] if the top-level working tree cannot be
    /// cloned.
    pub fn restore_extracted(
        &self,
        container: &Utf8Path,
        dest_dir: &Utf8Path,
    ) -> Result<UnpackOutcome> {
        let container = container.canonicalize_utf8()?;
        let manifest = load_container(&container)?;
        let repository = dest_dir.join(manifest.repo_name());

        info!("restoring {} into {repository}", manifest.repo_name());
        self.git
            .clone_local(&container.join(REPOSITORY_DIRNAME), &repository)?;

        let mut warnings = Vec::new();
        self.restore_tree(&container, &repository, &manifest, &mut warnings);
        Ok(UnpackOutcome {
            repository,
            manifest,
            warnings,
        })
    }

    /// Finishes a freshly cloned working tree: origin, LFS and submodules.
    fn restore_tree(
        &self,
        container: &Utf8Path,
        worktree: &Utf8Path,
        manifest: &ArchiveManifest,
        warnings: &mut Vec<Warning>,
    ) {
        if let Err(err) = self.git.set_origin(worktree, manifest.source_url()) {
            warnings.push(
                Warning::OriginRewriteFailed {
                    repo_name: manifest.repo_name().to_owned(),
                    reason: err.to_string(),
                }
                .logged(),
            );
        }

        if manifest.has_lfs() {
            if let Err(err) = self.restore_lfs(container, worktree) {
                warnings.push(
                    Warning::LfsRestoreFailed {
                        repo_name: manifest.repo_name().to_owned(),
                        reason: err.to_string(),
                    }
                    .logged(),
                );
            }
        }

        for record in manifest.submodules() {
            let nested = submodule_container(container, &record.name)
                .filter(|nested| nested.join(REPOSITORY_DIRNAME).is_dir());
            let Some(nested) = nested else {
                warnings.push(
                    Warning::SubmoduleNotArchived {
                        name: record.name.clone(),
                    }
                    .logged(),
                );
                continue;
            };
            if let Err(err) = self.restore_submodule(&nested, worktree, record, warnings) {
                warnings.push(
                    Warning::SubmoduleRestoreFailed {
                        name: record.name.clone(),
                        reason: err.to_string(),
                    }
                    .logged(),
                );
            }
        }
    }

    fn restore_lfs(&self, container: &Utf8Path, worktree: &Utf8Path) -> Result<()> {
        let store = container.join(LFS_DIRNAME);
        if !store.is_dir() {
            return Err(BundlerError::Lfs {
                operation: "restore",
                message: format!("archived LFS store {store} is missing"),
            });
        }
        let git_dir = self.git.absolute_git_dir(worktree)?;
        copy_tree(&store, &git_dir.join(LFS_DIRNAME))?;
        self.git.lfs_checkout(worktree)
    }

    fn restore_submodule(
        &self,
        nested: &Utf8Path,
        worktree: &Utf8Path,
        record: &SubmoduleRecord,
        warnings: &mut Vec<Warning>,
    ) -> Result<()> {
        debug!("restoring submodule {} at {}", record.name, record.path);
        let nested_manifest = read_manifest(nested)?;
        let url_key = format!("submodule.{}.url", record.name);
        let mirror = nested.join(REPOSITORY_DIRNAME);

        self.git.set_config(worktree, &url_key, mirror.as_str())?;
        self.git.submodule_update(worktree, &record.path)?;

        let recorded_url = if record.resolved_url.is_empty() {
            &record.raw_url
        } else {
            &record.resolved_url
        };
        self.git.set_config(worktree, &url_key, recorded_url)?;

        let sub_worktree = worktree.join(&record.path);
        self.restore_tree(nested, &sub_worktree, &nested_manifest, warnings);
        Ok(())
    }
}

/// Reads and checks the top-level entries of an extracted container.
fn load_container(container: &Utf8Path) -> Result<ArchiveManifest> {
    if !container.join(MANIFEST_FILENAME).is_file() {
        return Err(ArchiveError::MissingManifest {
            path: container.to_owned(),
        }
        .into());
    }
    if !container.join(REPOSITORY_DIRNAME).is_dir() {
        return Err(ArchiveError::MissingRepositoryData {
            path: container.to_owned(),
        }
        .into());
    }
    Ok(read_manifest(container)?)
}

/// Ensures `dest_dir` is an empty directory, creating it when absent.
fn prepare_destination(dest_dir: &Utf8Path) -> Result<()> {
    if dest_dir.exists() {
        let is_empty_dir = dest_dir.is_dir() && dest_dir.read_dir_utf8()?.next().is_none();
        if !is_empty_dir {
            return Err(ArchiveError::DestinationNotEmpty {
                path: dest_dir.to_owned(),
            }
            .into());
        }
        return Ok(());
    }
    std::fs::create_dir_all(dest_dir)?;
    Ok(())
}

/// Recursively copies the directory `src` into `dst`, merging with any
/// existing content.
fn copy_tree(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in src.read_dir_utf8()? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "unpacker_tests.rs"]
mod tests;
