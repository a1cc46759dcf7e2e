//! Archive creation.
//!
//! The archiver mirror-clones the source repository into a scoped
//! workspace, captures its LFS object store, then walks `.gitmodules` at
//! HEAD and archives every submodule recursively into a nested container.
//! Only the top-level clone is fatal. A submodule that cannot be archived is
//! dropped from its parent's manifest with a [`Warning`], and a repository
//! whose LFS objects cannot be fetched is archived without them.
//!
//! Recursion is bounded by the chain of repositories currently being
//! archived: a submodule whose URL matches an ancestor is skipped.

use crate::command::CommandExecutor;
use crate::error::{BundlerError, Result};
use crate::git::Git;
use crate::gitmodules::{self, SubmoduleEntry};
use crate::layout::{LFS_DIRNAME, REPOSITORY_DIRNAME, is_safe_relative, submodule_container};
use crate::manifest::{
    ArchiveManifest, Compression, CreatedAt, ManifestContent, ManifestProvenance, SubmoduleRecord,
    write_manifest,
};
use crate::packaging::{artifact_name, package_container};
use crate::url::{comparison_key, repo_name, resolve};
use crate::verifier::{VerificationReport, Verifier};
use crate::warning::Warning;
use crate::workspace::{ScopedWorkspace, utf8_path};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

/// What to archive and where to put it.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    /// URL or local path of the repository to archive.
    pub source_url: String,
    /// Directory receiving the artifact; created when absent.
    pub output_dir: Utf8PathBuf,
    /// Compression of the artifact.
    pub compression: Compression,
    /// Whether to verify the artifact after writing it.
    pub verify_after: bool,
}

/// Result of a successful archive run.
#[derive(Debug)]
pub struct ArchiveOutcome {
    /// Path of the written artifact.
    pub archive_path: Utf8PathBuf,
    /// Manifest of the top-level container.
    pub manifest: ArchiveManifest,
    /// Non-fatal problems, in the order they were encountered.
    pub warnings: Vec<Warning>,
    /// Verification report when verification was requested.
    pub verification: Option<VerificationReport>,
}

/// State shared by every container of one archive run.
struct ArchiveContext {
    created_at: CreatedAt,
    compression: Compression,
    warnings: Vec<Warning>,
}

impl ArchiveContext {
    fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning.logged());
    }
}

/// Produces archive artifacts.
pub struct Archiver<'a> {
    executor: &'a dyn CommandExecutor,
    git: Git<'a>,
}

impl<'a> Archiver<'a> {
    /// Creates an archiver issuing git commands through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            git: Git::new(executor),
        }
    }

    /// Archives `request.source_url` into a new artifact.
    ///
    /// # Errors
    ///
    /// Returns [`BundlerError::Clone`] if the top-level repository cannot be
    /// cloned, [`crate::error::ArchiveError::AlreadyExists`] if the artifact
    /// path is taken, and I/O, manifest or packaging errors.
    pub fn archive(&self, request: &ArchiveRequest) -> Result<ArchiveOutcome> {
        let source_url = normalise_source(&request.source_url)?;
        let mut ctx = ArchiveContext {
            created_at: CreatedAt::now(),
            compression: request.compression,
            warnings: Vec::new(),
        };

        let workspace = ScopedWorkspace::new()?;
        let container = workspace.path().join("container");
        let manifest = self.archive_container(&source_url, &container, Vec::new(), &mut ctx)?;

        std::fs::create_dir_all(&request.output_dir)?;
        let archive_path = request.output_dir.join(artifact_name(
            manifest.repo_name(),
            &ctx.created_at,
            ctx.compression,
        ));
        package_container(&container, &archive_path, ctx.compression)?;
        workspace.close()?;
        info!("archive written to {archive_path}");

        let verification = request
            .verify_after
            .then(|| Verifier::new(self.executor).verify(&archive_path));

        Ok(ArchiveOutcome {
            archive_path,
            manifest,
            warnings: ctx.warnings,
            verification,
        })
    }

    /// Archives one repository and, recursively, its submodules into
    /// `container`.
    fn archive_container(
        &self,
        source_url: &str,
        container: &Utf8Path,
        mut ancestors: Vec<String>,
        ctx: &mut ArchiveContext,
    ) -> Result<ArchiveManifest> {
        let name = repo_name(source_url);
        ancestors.push(comparison_key(source_url));
        std::fs::create_dir_all(container)?;

        info!("cloning {source_url}");
        let mirror = container.join(REPOSITORY_DIRNAME);
        self.git.clone_mirror(source_url, &mirror)?;

        let has_lfs = self.capture_lfs(&mirror, container, &name, ctx);
        let submodules = self.archive_submodules(source_url, container, &ancestors, ctx)?;

        let manifest = ArchiveManifest::new(
            ManifestProvenance::new(source_url, name, ctx.created_at.clone()),
            ManifestContent {
                compression: ctx.compression,
                has_lfs,
                submodules,
            },
        );
        write_manifest(container, &manifest)?;
        Ok(manifest)
    }

    /// Fetches every LFS object of the mirror and moves the store into the
    /// container. Returns whether objects were captured.
    fn capture_lfs(
        &self,
        mirror: &Utf8Path,
        container: &Utf8Path,
        repo_name: &str,
        ctx: &mut ArchiveContext,
    ) -> bool {
        match self.fetch_lfs(mirror, container) {
            Ok(captured) => captured,
            Err(err) => {
                ctx.warn(Warning::LfsSkipped {
                    repo_name: repo_name.to_owned(),
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    fn fetch_lfs(&self, mirror: &Utf8Path, container: &Utf8Path) -> Result<bool> {
        let files = self.git.lfs_files(mirror)?;
        if files.is_empty() {
            return Ok(false);
        }
        debug!("{} LFS files tracked in {mirror}", files.len());

        self.git.lfs_fetch_all(mirror)?;
        let store = mirror.join(LFS_DIRNAME);
        if !store.is_dir() {
            return Err(BundlerError::Lfs {
                operation: "fetch",
                message: format!("no object store at {store} after fetching"),
            });
        }
        std::fs::rename(&store, container.join(LFS_DIRNAME))?;
        Ok(true)
    }

    /// Archives the submodules declared in `.gitmodules` at HEAD.
    fn archive_submodules(
        &self,
        parent_url: &str,
        container: &Utf8Path,
        ancestors: &[String],
        ctx: &mut ArchiveContext,
    ) -> Result<Vec<SubmoduleRecord>> {
        let mirror = container.join(REPOSITORY_DIRNAME);
        let Some(config) = self.git.gitmodules_config(&mirror)? else {
            return Ok(Vec::new());
        };

        let parsed = gitmodules::parse(&config);
        for diagnostic in parsed.diagnostics {
            ctx.warn(Warning::from_diagnostic(diagnostic));
        }

        let mut records = Vec::with_capacity(parsed.entries.len());
        for entry in parsed.entries {
            match self.archive_submodule(&entry, parent_url, container, ancestors, ctx) {
                Ok(record) => records.push(record),
                Err(err) => {
                    remove_partial(container, &entry.name);
                    ctx.warn(Warning::SubmoduleSkipped {
                        name: entry.name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(records)
    }

    fn archive_submodule(
        &self,
        entry: &SubmoduleEntry,
        parent_url: &str,
        container: &Utf8Path,
        ancestors: &[String],
        ctx: &mut ArchiveContext,
    ) -> Result<SubmoduleRecord> {
        let Some(nested) = submodule_container(container, &entry.name) else {
            return Err(submodule_error(entry, "name is not a safe relative path"));
        };
        if !is_safe_relative(&entry.path) {
            return Err(submodule_error(entry, "path is not a safe relative path"));
        }

        let resolved_url = resolve(&entry.url, parent_url)?;
        if ancestors.contains(&comparison_key(&resolved_url)) {
            return Err(submodule_error(
                entry,
                &format!("{resolved_url} is already being archived (recursive submodule)"),
            ));
        }

        info!("archiving submodule {} from {resolved_url}", entry.name);
        self.archive_container(&resolved_url, &nested, ancestors.to_vec(), ctx)?;
        Ok(SubmoduleRecord {
            name: entry.name.clone(),
            path: entry.path.clone(),
            raw_url: entry.url.clone(),
            resolved_url,
        })
    }
}

fn submodule_error(entry: &SubmoduleEntry, reason: &str) -> BundlerError {
    BundlerError::Submodule {
        name: entry.name.clone(),
        reason: reason.to_owned(),
    }
}

/// Removes whatever a failed submodule left behind in its nested container.
fn remove_partial(container: &Utf8Path, name: &str) {
    let Some(nested) = submodule_container(container, name) else {
        return;
    };
    if nested.exists() && std::fs::remove_dir_all(&nested).is_err() {
        log::warn!("could not remove partial container {nested}");
    }
}

/// Makes a local-path source absolute; URLs pass through unchanged.
fn normalise_source(source: &str) -> Result<String> {
    let path = std::path::Path::new(source);
    if !path.exists() {
        return Ok(source.to_owned());
    }
    Ok(utf8_path(&path.canonicalize()?)?.into_string())
}

#[cfg(test)]
#[path = "archiver_tests.rs"]
mod tests;
