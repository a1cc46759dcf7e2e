//! Error types for the git bundler.
//!
//! [`BundlerError`] is the crate-wide error. Errors that make an archive
//! unusable propagate to the process boundary; errors local to one submodule
//! or to the optional LFS step are caught by the archiver and unpacker and
//! downgraded to [`Warning`](crate::warning::Warning)s.

use crate::extraction::ExtractionError;
use crate::manifest::ManifestError;
use crate::packaging::PackagingError;
use crate::url::UrlResolutionError;
use camino::Utf8PathBuf;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while archiving, unpacking or verifying.
#[derive(Debug, Error)]
pub enum BundlerError {
    /// A required external tool is not installed or not on `PATH`.
    #[error("'{tool}' is not installed or not in PATH")]
    DependencyMissing {
        /// Name of the missing tool.
        tool: &'static str,
    },

    /// Mirror-cloning a repository failed.
    #[error("failed to clone {url}: {message}")]
    Clone {
        /// The URL that could not be cloned.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Capturing or restoring LFS objects failed.
    #[error("git lfs {operation} failed: {message}")]
    Lfs {
        /// The LFS operation that failed (ls-files, fetch, checkout, ...).
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A submodule could not be archived or restored.
    #[error("submodule {name}: {reason}")]
    Submodule {
        /// Name of the submodule as declared in `.gitmodules`.
        name: String,
        /// Description of the failure.
        reason: String,
    },

    /// The archive manifest is unreadable or invalid.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The archive itself is missing, malformed or cannot be written.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A relative submodule URL could not be resolved.
    #[error(transparent)]
    UrlResolution(#[from] UrlResolutionError),

    /// Writing the compressed container failed.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// A git operation other than the mirror clone failed.
    #[error("git {operation} failed: {message}")]
    Git {
        /// The git operation that failed (clone, fsck, submodule update, ...).
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A path could not be represented as UTF-8.
    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Problems with the archive artifact or the locations around it.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive file does not exist.
    #[error("archive not found at {path}")]
    NotFound {
        /// Path where the archive was expected.
        path: Utf8PathBuf,
    },

    /// The archive has no `manifest.json` at its root.
    #[error("invalid archive (missing manifest): {path}")]
    MissingManifest {
        /// Path of the container that lacks the manifest.
        path: Utf8PathBuf,
    },

    /// The archive has no `repo.git` mirror data.
    #[error("invalid archive (missing repository data): {path}")]
    MissingRepositoryData {
        /// Path of the container that lacks the mirror.
        path: Utf8PathBuf,
    },

    /// The unpack destination exists and is not an empty directory.
    #[error("destination {path} must be an empty or absent directory")]
    DestinationNotEmpty {
        /// The rejected destination.
        path: Utf8PathBuf,
    },

    /// The output artifact already exists; archives are write-once.
    #[error("refusing to overwrite existing archive {path}")]
    AlreadyExists {
        /// Path of the existing artifact.
        path: Utf8PathBuf,
    },

    /// The compressed container could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Result type alias using [`BundlerError`].
pub type Result<T> = std::result::Result<T, BundlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_missing_names_the_tool() {
        let err = BundlerError::DependencyMissing { tool: "git-lfs" };
        assert_eq!(err.to_string(), "'git-lfs' is not installed or not in PATH");
    }

    #[test]
    fn clone_error_includes_url_and_message() {
        let err = BundlerError::Clone {
            url: "https://host.example/group/repo.git".to_owned(),
            message: "repository not found".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://host.example/group/repo.git"));
        assert!(msg.contains("repository not found"));
    }

    #[test]
    fn missing_manifest_and_missing_repository_are_distinct() {
        let manifest = ArchiveError::MissingManifest {
            path: Utf8PathBuf::from("/tmp/x"),
        };
        let repository = ArchiveError::MissingRepositoryData {
            path: Utf8PathBuf::from("/tmp/x"),
        };
        assert!(manifest.to_string().contains("missing manifest"));
        assert!(repository.to_string().contains("missing repository data"));
    }

    #[test]
    fn archive_errors_convert_transparently() {
        let err = BundlerError::from(ArchiveError::NotFound {
            path: Utf8PathBuf::from("/tmp/missing.tar.zst"),
        });
        assert_eq!(err.to_string(), "archive not found at /tmp/missing.tar.zst");
    }

    #[test]
    fn io_error_preserves_message() {
        let err = BundlerError::from(std::io::Error::other("disk full"));
        assert!(err.to_string().contains("disk full"));
    }
}
