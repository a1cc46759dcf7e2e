//! Archive integrity verification.
//!
//! The verifier extracts an artifact into a disposable workspace, checks the
//! object database of every archived mirror, performs a full restore there
//! and then checks the restored working trees. The artifact itself is never
//! modified. Problems are collected into a [`VerificationReport`] rather
//! than returned as errors, so one run reports everything it finds.

use crate::command::CommandExecutor;
use crate::extraction::extract_container;
use crate::git::{Git, SubmoduleState, SubmoduleStatus};
use crate::layout::{REPOSITORY_DIRNAME, submodule_container};
use crate::manifest::{ArchiveManifest, read_manifest};
use crate::unpacker::Unpacker;
use crate::workspace::ScopedWorkspace;
use camino::Utf8Path;
use log::{debug, info};
use std::fmt;

/// One integrity problem found by the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityFailure {
    /// Which part of the archive failed, e.g. `repository` or
    /// `submodules/lib/lfs`.
    pub component: String,
    /// Description of the failure.
    pub detail: String,
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.detail)
    }
}

/// Every failure found while verifying one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Failures in the order they were found.
    pub failures: Vec<IntegrityFailure>,
}

impl VerificationReport {
    /// Returns `true` when no failure was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, component: impl Into<String>, detail: impl fmt::Display) {
        let failure = IntegrityFailure {
            component: component.into(),
            detail: detail.to_string(),
        };
        log::warn!("integrity check failed: {failure}");
        self.failures.push(failure);
    }
}

/// Runs integrity checks against archive artifacts.
pub struct Verifier<'a> {
    executor: &'a dyn CommandExecutor,
    git: Git<'a>,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier issuing git commands through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            git: Git::new(executor),
        }
    }

    /// Verifies the archive at `archive`.
    ///
    /// Never fails: every problem, including an unreadable artifact, is
    /// reported as an [`IntegrityFailure`].
    #[must_use]
    pub fn verify(&self, archive: &Utf8Path) -> VerificationReport {
        let mut report = VerificationReport::default();
        info!("verifying {archive}");

        let workspace = match ScopedWorkspace::new() {
            Ok(workspace) => workspace,
            Err(err) => {
                report.fail("workspace", err);
                return report;
            }
        };
        let container = workspace.path().join("container");
        if let Err(err) = extract_container(archive, &container) {
            report.fail("archive", err);
            return report;
        }

        let manifest = match read_manifest(&container) {
            Ok(manifest) => manifest,
            Err(err) => {
                report.fail("manifest", err);
                return report;
            }
        };

        self.check_mirrors(&container, &manifest, "", &mut report);

        let restore_dir = workspace.path().join("restore");
        match Unpacker::new(self.executor).restore_extracted(&container, &restore_dir) {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    report.fail("restore", warning);
                }
                self.check_restored(
                    &container,
                    &outcome.repository,
                    &outcome.manifest,
                    &mut report,
                );
            }
            Err(err) => report.fail("restore", err),
        }

        if report.is_ok() {
            info!("{archive} verified");
        }
        report
    }

    /// Runs `git fsck --full` on the mirror of `container` and of every
    /// nested container recorded in its manifest.
    fn check_mirrors(
        &self,
        container: &Utf8Path,
        manifest: &ArchiveManifest,
        prefix: &str,
        report: &mut VerificationReport,
    ) {
        let mirror = container.join(REPOSITORY_DIRNAME);
        debug!("fsck {mirror}");
        if let Err(err) = self.git.fsck(&mirror) {
            report.fail(format!("{prefix}repository"), err);
        }

        for record in manifest.submodules() {
            let nested_prefix = format!("{prefix}submodules/{}/", record.name);
            let Some(nested) = submodule_container(container, &record.name) else {
                continue;
            };
            match read_manifest(&nested) {
                Ok(nested_manifest) => {
                    self.check_mirrors(&nested, &nested_manifest, &nested_prefix, report);
                }
                Err(err) => report.fail(format!("{nested_prefix}manifest"), err),
            }
        }
    }

    /// Checks a restored working tree: LFS objects when captured, and that
    /// every recorded submodule is present and initialised.
    fn check_restored(
        &self,
        container: &Utf8Path,
        worktree: &Utf8Path,
        manifest: &ArchiveManifest,
        report: &mut VerificationReport,
    ) {
        let statuses = if manifest.submodules().is_empty() {
            Vec::new()
        } else {
            match self.git.submodule_status(worktree) {
                Ok(statuses) => statuses,
                Err(err) => {
                    report.fail("submodules", err);
                    Vec::new()
                }
            }
        };
        let tree = RestoredTree {
            container,
            worktree,
            manifest,
            component_prefix: "",
            path_prefix: "",
        };
        self.check_tree(&tree, &statuses, report);
    }

    fn check_tree(
        &self,
        tree: &RestoredTree<'_>,
        statuses: &[SubmoduleStatus],
        report: &mut VerificationReport,
    ) {
        if tree.manifest.has_lfs() {
            if let Err(err) = self.git.lfs_fsck(tree.worktree) {
                report.fail(format!("{}lfs", tree.component_prefix), err);
            }
        }

        for record in tree.manifest.submodules() {
            let component = format!("{}submodules", tree.component_prefix);
            let full_path = format!("{}{}", tree.path_prefix, record.path);
            let state = statuses
                .iter()
                .find(|status| status.path == full_path)
                .map(|status| status.state);
            let problem = match state {
                None => "is missing",
                Some(SubmoduleState::Uninitialized) => "is not initialised",
                Some(SubmoduleState::Conflicted) => "has conflicts",
                Some(SubmoduleState::Current | SubmoduleState::Modified) => "",
            };
            if !problem.is_empty() {
                report.fail(
                    component,
                    format!("recorded submodule {} at {full_path} {problem}", record.name),
                );
                continue;
            }

            let Some(nested) = submodule_container(tree.container, &record.name) else {
                continue;
            };
            let Ok(nested_manifest) = read_manifest(&nested) else {
                // Already reported by the mirror checks.
                continue;
            };
            let nested_tree = RestoredTree {
                container: &nested,
                worktree: &tree.worktree.join(&record.path),
                manifest: &nested_manifest,
                component_prefix: &format!("{component}/{}/", record.name),
                path_prefix: &format!("{full_path}/"),
            };
            self.check_tree(&nested_tree, statuses, report);
        }
    }
}

/// A restored working tree together with the container it came from.
struct RestoredTree<'t> {
    container: &'t Utf8Path,
    worktree: &'t Utf8Path,
    manifest: &'t ArchiveManifest,
    component_prefix: &'t str,
    path_prefix: &'t str,
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
