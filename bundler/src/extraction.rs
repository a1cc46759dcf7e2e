//! Archive extraction.
//!
//! Unpacks a `.tar.zst` or `.tar.gz` artifact into a directory. The
//! compression is detected from the leading magic bytes rather than the file
//! name, and entries that would escape the destination are rejected before
//! anything is written for them.

use camino::Utf8Path;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path};

use crate::manifest::Compression;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction, including truncated or corrupt streams.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive contains no entries")]
    EmptyArchive,

    /// The file is neither zstd nor gzip compressed.
    #[error("unrecognised archive format (expected zstd or gzip)")]
    UnknownFormat,
}

/// Detects the compression of an artifact from its magic bytes and rewinds
/// the file.
fn sniff(file: &mut File) -> Result<Compression, ExtractionError> {
    let mut magic = Vec::with_capacity(ZSTD_MAGIC.len());
    file.by_ref()
        .take(ZSTD_MAGIC.len() as u64)
        .read_to_end(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if magic.starts_with(&ZSTD_MAGIC) {
        Ok(Compression::Zstd)
    } else if magic.starts_with(&GZIP_MAGIC) {
        Ok(Compression::Gz)
    } else {
        Err(ExtractionError::UnknownFormat)
    }
}

/// Extracts the artifact at `archive` into `dest_dir`.
///
/// Returns the number of entries unpacked.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
/// escape the destination, [`ExtractionError::EmptyArchive`] if there are no
/// entries, [`ExtractionError::UnknownFormat`] for unrecognised files, and
/// [`ExtractionError::Io`] on I/O failures.
pub fn extract_container(
    archive: &Utf8Path,
    dest_dir: &Utf8Path,
) -> Result<usize, ExtractionError> {
    let mut file = File::open(archive)?;
    let reader: Box<dyn Read> = match sniff(&mut file)? {
        Compression::Zstd => Box::new(zstd::Decoder::new(file)?),
        Compression::Gz => Box::new(flate2::read::GzDecoder::new(file)),
    };

    std::fs::create_dir_all(dest_dir)?;
    let mut archive = tar::Archive::new(reader);
    let mut extracted = 0;

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;
        if entry.unpack_in(dest_dir)? {
            extracted += 1;
        }
    }

    if extracted == 0 {
        return Err(ExtractionError::EmptyArchive);
    }
    Ok(extracted)
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
