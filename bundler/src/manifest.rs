//! Manifest schema for archive containers.
//!
//! Every container (the top of an archive and each nested submodule
//! container) carries a `manifest.json` describing where the repository came
//! from, when it was archived, and which submodules were captured. The
//! manifest is built once by the archiver and only ever read afterwards.
//!
//! ```json
//! {
//!   "source_url": "https://host.example/group/repo.git",
//!   "repo_name": "repo",
//!   "created_at": "2026-10-18T09:30:00Z",
//!   "tool_version": "3.0",
//!   "compression": "zstd",
//!   "has_lfs": false,
//!   "submodules": [
//!     {
//!       "name": "lib",
//!       "path": "vendor/lib",
//!       "raw_url": "../lib.git",
//!       "resolved_url": "https://host.example/lib.git"
//!     }
//!   ]
//! }
//! ```

use crate::layout::{MANIFEST_FILENAME, is_safe_relative};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Archive format version written by this build.
pub const FORMAT_VERSION: &str = "3.0";

/// Errors arising from reading, writing or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read or written.
    #[error("failed to access manifest {path}: {source}")]
    Io {
        /// Path of the manifest file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid JSON or does not match the schema.
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The archive was written by an incompatible format version.
    #[error("unsupported archive format version {found} (this build reads {supported})")]
    IncompatibleVersion {
        /// Version recorded in the manifest.
        found: String,
        /// Version this build writes.
        supported: &'static str,
    },

    /// A field violates the manifest rules.
    #[error("invalid manifest: {reason}")]
    Invalid {
        /// Description of the violated rule.
        reason: String,
    },
}

/// Compression applied to the archive artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// gzip via `flate2`, producing `.tar.gz`.
    Gz,
    /// Zstandard, producing `.tar.zst`.
    #[default]
    Zstd,
}

impl Compression {
    /// Returns the artifact file extension, without the leading dot.
    ///
    /// # Examples
    ///
    /// ```
    /// use git_bundler::manifest::Compression;
    ///
    /// assert_eq!(Compression::Gz.extension(), "tar.gz");
    /// assert_eq!(Compression::Zstd.extension(), "tar.zst");
    /// ```
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gz => "tar.gz",
            Self::Zstd => "tar.zst",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gz => "gz",
            Self::Zstd => "zstd",
        })
    }
}

/// An ISO 8601 UTC timestamp (`YYYY-MM-DDThh:mm:ssZ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatedAt(String);

impl CreatedAt {
    /// Returns the current UTC time.
    ///
    /// A clock set before the Unix epoch is reported as the epoch itself.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self::from_epoch_secs(secs)
    }

    /// Formats a Unix epoch timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use git_bundler::manifest::CreatedAt;
    ///
    /// let ts = CreatedAt::from_epoch_secs(1_700_000_000);
    /// assert_eq!(ts.as_str(), "2023-11-14T22:13:20Z");
    /// ```
    #[must_use]
    pub fn from_epoch_secs(epoch_secs: u64) -> Self {
        let (year, month, day) = civil_from_epoch(epoch_secs);
        let day_secs = epoch_secs % 86_400;
        let hour = day_secs / 3_600;
        let minute = (day_secs % 3_600) / 60;
        let second = day_secs % 60;
        Self(format!(
            "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z"
        ))
    }

    /// Returns the timestamp as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the compact `YYYYmmdd_HHMMSS` form used in artifact names.
    ///
    /// # Examples
    ///
    /// ```
    /// use git_bundler::manifest::CreatedAt;
    ///
    /// let ts = CreatedAt::from_epoch_secs(1_700_000_000);
    /// assert_eq!(ts.file_stamp(), "20231114_221320");
    /// ```
    #[must_use]
    pub fn file_stamp(&self) -> String {
        let digits: String = self.0.chars().filter(char::is_ascii_digit).collect();
        let (date, time) = digits.split_at(digits.len().min(8));
        format!("{date}_{time}")
    }

    fn is_well_formed(&self) -> bool {
        let b = self.0.as_bytes();
        let digits_at = |range: std::ops::Range<usize>| {
            b.get(range)
                .is_some_and(|bytes| bytes.iter().all(u8::is_ascii_digit))
        };
        b.len() == 20
            && b.get(4) == Some(&b'-')
            && b.get(7) == Some(&b'-')
            && b.get(10) == Some(&b'T')
            && b.get(13) == Some(&b':')
            && b.get(16) == Some(&b':')
            && b.get(19) == Some(&b'Z')
            && digits_at(0..4)
            && digits_at(5..7)
            && digits_at(8..10)
            && digits_at(11..13)
            && digits_at(14..16)
            && digits_at(17..19)
    }
}

impl fmt::Display for CreatedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a Unix epoch timestamp to a `(year, month, day)` triple.
///
/// Adapted from Howard Hinnant's `civil_from_days` algorithm.
fn civil_from_epoch(epoch_secs: u64) -> (i64, u64, u64) {
    let z = i64::try_from(epoch_secs / 86_400).unwrap_or(i64::MAX - 719_468) + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097).unsigned_abs(); // day of era [0, 146_096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = i64::try_from(yoe).unwrap_or_default() + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// A submodule captured in a nested container at `submodules/<name>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleRecord {
    /// Submodule name, unique within the owning manifest.
    pub name: String,
    /// Checkout path inside the parent working tree.
    pub path: String,
    /// URL exactly as written in `.gitmodules`.
    pub raw_url: String,
    /// Absolute URL the submodule was cloned from. Manifests written by
    /// other tools may leave it empty, in which case `raw_url` is used.
    pub resolved_url: String,
}

/// Identity fields of an archived repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestProvenance {
    /// URL the repository was cloned from.
    pub source_url: String,
    /// Name derived from the source URL.
    pub repo_name: String,
    /// When the archive was created.
    pub created_at: CreatedAt,
    /// Archive format version.
    pub tool_version: String,
}

impl ManifestProvenance {
    /// Creates provenance stamped with the current [`FORMAT_VERSION`].
    #[must_use]
    pub fn new(
        source_url: impl Into<String>,
        repo_name: impl Into<String>,
        created_at: CreatedAt,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            repo_name: repo_name.into(),
            created_at,
            tool_version: FORMAT_VERSION.to_owned(),
        }
    }
}

/// Content fields describing what the container holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestContent {
    /// Compression of the artifact.
    pub compression: Compression,
    /// Whether the container holds an LFS object store.
    pub has_lfs: bool,
    /// Captured submodules in `.gitmodules` order.
    pub submodules: Vec<SubmoduleRecord>,
}

/// The manifest shipped at the root of every archive container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    #[serde(flatten)]
    provenance: ManifestProvenance,
    #[serde(flatten)]
    content: ManifestContent,
}

impl ArchiveManifest {
    /// Constructs a manifest from provenance and content groups.
    #[must_use]
    pub const fn new(provenance: ManifestProvenance, content: ManifestContent) -> Self {
        Self {
            provenance,
            content,
        }
    }

    /// Returns the URL the repository was cloned from.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.provenance.source_url
    }

    /// Returns the repository name.
    #[must_use]
    pub fn repo_name(&self) -> &str {
        &self.provenance.repo_name
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> &CreatedAt {
        &self.provenance.created_at
    }

    /// Returns the archive format version.
    #[must_use]
    pub fn tool_version(&self) -> &str {
        &self.provenance.tool_version
    }

    /// Returns the artifact compression.
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.content.compression
    }

    /// Returns whether LFS objects were captured.
    #[must_use]
    pub const fn has_lfs(&self) -> bool {
        self.content.has_lfs
    }

    /// Returns the captured submodules in declaration order.
    #[must_use]
    pub fn submodules(&self) -> &[SubmoduleRecord] {
        &self.content.submodules
    }

    /// Checks the manifest against the format rules.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::IncompatibleVersion`] for a foreign major
    /// version and [`ManifestError::Invalid`] for any other violated rule.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if !is_compatible_version(self.tool_version()) {
            return Err(ManifestError::IncompatibleVersion {
                found: self.tool_version().to_owned(),
                supported: FORMAT_VERSION,
            });
        }
        if self.source_url().is_empty() {
            return Err(invalid("source_url is empty"));
        }
        if !is_safe_relative(self.repo_name()) || self.repo_name().contains('/') {
            return Err(invalid(format!(
                "repo_name {:?} is not a single path component",
                self.repo_name()
            )));
        }
        if !self.created_at().is_well_formed() {
            return Err(invalid(format!(
                "created_at {} is not YYYY-MM-DDThh:mm:ssZ",
                self.created_at()
            )));
        }

        let mut names = HashSet::new();
        for record in self.submodules() {
            if !is_safe_relative(&record.name) {
                return Err(invalid(format!("unsafe submodule name {:?}", record.name)));
            }
            if !names.insert(record.name.as_str()) {
                return Err(invalid(format!("duplicate submodule name {}", record.name)));
            }
            if !is_safe_relative(&record.path) {
                return Err(invalid(format!(
                    "unsafe path {:?} for submodule {}",
                    record.path, record.name
                )));
            }
            if record.resolved_url.is_empty() && record.raw_url.is_empty() {
                return Err(invalid(format!("submodule {} has no URL", record.name)));
            }
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ManifestError {
    ManifestError::Invalid {
        reason: reason.into(),
    }
}

/// Returns `true` when `version` shares the major component of
/// [`FORMAT_VERSION`].
///
/// # Examples
///
/// ```
/// use git_bundler::manifest::is_compatible_version;
///
/// assert!(is_compatible_version("3.0"));
/// assert!(is_compatible_version("3.2"));
/// assert!(!is_compatible_version("2.0"));
/// ```
#[must_use]
pub fn is_compatible_version(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_owned);
    !version.is_empty() && major(version) == major(FORMAT_VERSION)
}

/// Parses and validates manifest JSON.
///
/// # Errors
///
/// Returns [`ManifestError::Json`] for malformed JSON or missing fields and
/// the errors of [`ArchiveManifest::validate`] for rule violations.
pub fn parse_manifest(json: &str) -> Result<ArchiveManifest, ManifestError> {
    let manifest: ArchiveManifest = serde_json::from_str(json)?;
    manifest.validate()?;
    Ok(manifest)
}

/// Serialises a manifest to pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ManifestError::Json`] if serialisation fails.
pub fn manifest_json(manifest: &ArchiveManifest) -> Result<String, ManifestError> {
    Ok(serde_json::to_string_pretty(manifest)?)
}

/// Reads and validates `manifest.json` from a container directory.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] if the file cannot be read, plus the errors
/// of [`parse_manifest`].
pub fn read_manifest(container: &Utf8Path) -> Result<ArchiveManifest, ManifestError> {
    let path = container.join(MANIFEST_FILENAME);
    let json = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
        path: path.clone(),
        source,
    })?;
    parse_manifest(&json)
}

/// Writes `manifest.json` into a container directory.
///
/// # Errors
///
/// Returns [`ManifestError::Json`] or [`ManifestError::Io`] on failure.
pub fn write_manifest(
    container: &Utf8Path,
    manifest: &ArchiveManifest,
) -> Result<(), ManifestError> {
    let path = container.join(MANIFEST_FILENAME);
    let json = manifest_json(manifest)?;
    std::fs::write(&path, json).map_err(|source| ManifestError::Io { path, source })
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
