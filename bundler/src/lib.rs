//! Git bundler library.
//!
//! This crate produces and restores portable, self-contained archives of a git
//! repository: every ref, the LFS object store, and recursively nested
//! submodules. It is used by the `git-bundler` CLI binary and can be consumed
//! programmatically for testing or custom archival workflows.
//!
//! # Modules
//!
//! - [`archiver`] - Mirror cloning, LFS capture, recursive submodule archiving
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution abstraction
//! - [`deps`] - Pre-flight checks for required external tools
//! - [`error`] - Semantic error types
//! - [`extraction`] - Archive extraction with path traversal protection
//! - [`git`] - Typed wrappers around the git and git-lfs invocations
//! - [`gitmodules`] - Tolerant parser for flattened `.gitmodules` config
//! - [`layout`] - Names of the entries inside an archive container
//! - [`manifest`] - Archive manifest schema and validation
//! - [`packaging`] - Compressed container creation
//! - [`unpacker`] - Repository reconstruction from an archive
//! - [`url`] - Repository name derivation and submodule URL resolution
//! - [`verifier`] - Disposable restore followed by integrity checks
//! - [`warning`] - Non-fatal issues collected during archive and restore
//! - [`workspace`] - Scoped temporary workspaces

pub mod archiver;
pub mod cli;
pub mod command;
pub mod deps;
pub mod error;
pub mod extraction;
pub mod git;
pub mod gitmodules;
pub mod layout;
pub mod manifest;
pub mod packaging;
pub mod unpacker;
pub mod url;
pub mod verifier;
pub mod warning;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
