//! Compressed container creation.
//!
//! A populated container directory is written as one tar stream, compressed
//! with zstd (`.tar.zst`) or gzip (`.tar.gz`). Nested submodule containers
//! travel as ordinary directories inside the same stream.

use crate::error::{ArchiveError, Result};
use crate::manifest::{Compression, CreatedAt};
use camino::Utf8Path;
use log::debug;
use std::fs;
use std::io::Write;
use thiserror::Error;

/// Errors arising from writing the compressed container.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// An I/O operation failed (reading the container, writing the stream).
    #[error("I/O error during packaging: {0}")]
    Io(#[from] std::io::Error),

    /// The container directory has nothing to package.
    #[error("container {path} is empty")]
    EmptyContainer {
        /// The empty container directory.
        path: String,
    },
}

/// Returns the artifact file name `<repo_name>_<YYYYmmdd_HHMMSS>.<ext>`.
///
/// # Examples
///
/// ```
/// use git_bundler::manifest::{Compression, CreatedAt};
/// use git_bundler::packaging::artifact_name;
///
/// let created_at = CreatedAt::from_epoch_secs(1_700_000_000);
/// assert_eq!(
///     artifact_name("app", &created_at, Compression::Zstd),
///     "app_20231114_221320.tar.zst"
/// );
/// ```
#[must_use]
pub fn artifact_name(repo_name: &str, created_at: &CreatedAt, compression: Compression) -> String {
    format!(
        "{repo_name}_{}.{}",
        created_at.file_stamp(),
        compression.extension()
    )
}

/// Writes `container` to a new artifact at `output_path`.
///
/// The artifact is created exclusively; an existing file is never
/// overwritten. A partially written artifact is removed on failure.
///
/// # Errors
///
/// Returns [`ArchiveError::AlreadyExists`] if `output_path` exists and
/// [`PackagingError`] if the container cannot be written.
pub fn package_container(
    container: &Utf8Path,
    output_path: &Utf8Path,
    compression: Compression,
) -> Result<()> {
    let file = match fs::File::create_new(output_path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(ArchiveError::AlreadyExists {
                path: output_path.to_owned(),
            }
            .into());
        }
        Err(err) => return Err(err.into()),
    };

    debug!("packaging {container} into {output_path} ({compression})");
    if let Err(err) = write_container(container, file, compression) {
        if fs::remove_file(output_path).is_err() {
            // Nothing to clean up if the file already vanished.
        }
        return Err(err.into());
    }
    Ok(())
}

/// Streams the contents of `container` as a compressed tar into `writer`.
///
/// Entries are added in sorted order and symlinks are stored as links.
///
/// # Errors
///
/// Returns [`PackagingError::EmptyContainer`] if the directory has no
/// entries and [`PackagingError::Io`] on read or write failures.
pub fn write_container<W: Write>(
    container: &Utf8Path,
    writer: W,
    compression: Compression,
) -> std::result::Result<(), PackagingError> {
    match compression {
        Compression::Gz => {
            let encoder = flate2::write::GzEncoder::new(writer, flate2::Compression::default());
            let encoder = append_container(container, encoder)?;
            encoder.finish()?;
        }
        Compression::Zstd => {
            let encoder = zstd::Encoder::new(writer, 0)?;
            let encoder = append_container(container, encoder)?;
            encoder.finish()?;
        }
    }
    Ok(())
}

fn append_container<W: Write>(
    container: &Utf8Path,
    writer: W,
) -> std::result::Result<W, PackagingError> {
    let mut names = Vec::new();
    for entry in container.read_dir_utf8()? {
        names.push(entry?.file_name().to_owned());
    }
    if names.is_empty() {
        return Err(PackagingError::EmptyContainer {
            path: container.to_string(),
        });
    }
    names.sort();

    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);
    for name in &names {
        let path = container.join(name);
        if path.symlink_metadata()?.is_dir() {
            builder.append_dir_all(name, &path)?;
        } else {
            builder.append_path_with_name(&path, name)?;
        }
    }
    Ok(builder.into_inner()?)
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
