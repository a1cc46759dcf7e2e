//! Non-fatal issues collected while archiving and restoring.
//!
//! A missing submodule or an unavailable LFS store must not abort the whole
//! operation. Such issues are logged at `warn` level and returned alongside
//! the result so callers can report or assert on them.

use crate::gitmodules::{ConfigDiagnostic, DiagnosticKind};
use std::fmt;

/// A recoverable problem encountered during archive, unpack or verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A line of the `.gitmodules` listing could not be parsed.
    ConfigLineSkipped {
        /// The parser diagnostic.
        diagnostic: ConfigDiagnostic,
    },

    /// A submodule was omitted from the archive.
    SubmoduleSkipped {
        /// Submodule name.
        name: String,
        /// Why it was skipped.
        reason: String,
    },

    /// LFS objects of a repository were not captured.
    LfsSkipped {
        /// Repository name.
        repo_name: String,
        /// Why the LFS store is absent.
        reason: String,
    },

    /// A manifest lists a submodule whose nested container is absent.
    SubmoduleNotArchived {
        /// Submodule name.
        name: String,
    },

    /// The restored repository still points at the archived mirror.
    OriginRewriteFailed {
        /// Repository name.
        repo_name: String,
        /// Description of the failure.
        reason: String,
    },

    /// A recorded submodule could not be restored.
    SubmoduleRestoreFailed {
        /// Submodule name.
        name: String,
        /// Description of the failure.
        reason: String,
    },

    /// LFS files could not be materialised in a working tree.
    LfsRestoreFailed {
        /// Repository name.
        repo_name: String,
        /// Description of the failure.
        reason: String,
    },
}

impl Warning {
    /// Converts a `.gitmodules` parser diagnostic into a warning.
    #[must_use]
    pub fn from_diagnostic(diagnostic: ConfigDiagnostic) -> Self {
        match diagnostic.kind {
            DiagnosticKind::MissingPath | DiagnosticKind::MissingUrl => Self::SubmoduleSkipped {
                reason: diagnostic.kind.to_string(),
                name: diagnostic.subject,
            },
            DiagnosticKind::MissingSeparator
            | DiagnosticKind::UnexpectedPrefix
            | DiagnosticKind::MissingName => Self::ConfigLineSkipped { diagnostic },
        }
    }

    /// Logs the warning at `warn` level and returns it.
    #[must_use]
    pub fn logged(self) -> Self {
        log::warn!("{self}");
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigLineSkipped { diagnostic } => {
                write!(f, "skipped .gitmodules entry ({diagnostic})")
            }
            Self::SubmoduleSkipped { name, reason } => {
                write!(f, "submodule {name} not archived: {reason}")
            }
            Self::LfsSkipped { repo_name, reason } => {
                write!(f, "LFS objects of {repo_name} not archived: {reason}")
            }
            Self::SubmoduleNotArchived { name } => {
                write!(f, "submodule {name} is listed but was not archived")
            }
            Self::OriginRewriteFailed { repo_name, reason } => {
                write!(f, "origin of {repo_name} not restored: {reason}")
            }
            Self::SubmoduleRestoreFailed { name, reason } => {
                write!(f, "submodule {name} not restored: {reason}")
            }
            Self::LfsRestoreFailed { repo_name, reason } => {
                write!(f, "LFS files of {repo_name} not restored: {reason}")
            }
        }
    }
}
