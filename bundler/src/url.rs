//! Repository name derivation and submodule URL resolution.
//!
//! Everything here is plain string manipulation: no filesystem or network
//! access. A submodule URL is relative only when it starts with `./` or
//! `../`; every other form (scheme URLs, scp-style `user@host:path`,
//! absolute paths, bare names) is treated as absolute and used verbatim.

use thiserror::Error;

/// Name used when no repository name can be derived from a URL.
pub const PLACEHOLDER_REPO_NAME: &str = "repository";

/// Errors arising from relative URL resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlResolutionError {
    /// The relative URL climbs above the root of the parent URL.
    #[error("relative URL {raw_url} climbs above the root of {parent_url}")]
    EscapesRoot {
        /// The relative submodule URL.
        raw_url: String,
        /// The parent repository URL it was resolved against.
        parent_url: String,
    },

    /// The parent URL has no path component to resolve against.
    #[error("parent URL {parent_url} has no path to resolve {raw_url} against")]
    NoParentPath {
        /// The relative submodule URL.
        raw_url: String,
        /// The parent repository URL.
        parent_url: String,
    },
}

/// Returns `true` when `url` is relative to its parent repository.
///
/// # Examples
///
/// ```
/// use git_bundler::url::is_relative;
///
/// assert!(is_relative("../lib.git"));
/// assert!(is_relative("./lib.git"));
/// assert!(!is_relative("git@host.example:group/lib.git"));
/// assert!(!is_relative("/srv/git/lib.git"));
/// ```
#[must_use]
pub fn is_relative(url: &str) -> bool {
    url.starts_with("./") || url.starts_with("../")
}

/// Resolves a submodule URL against the URL of its parent repository.
///
/// Absolute URLs are returned unchanged. Relative URLs are applied to the
/// directory containing the parent: the parent is stripped of trailing
/// slashes and a `.git` suffix, its last path segment is dropped, then each
/// `../` pops one more segment and `./` is a no-op.
///
/// # Errors
///
/// Returns [`UrlResolutionError::EscapesRoot`] when more `../` segments are
/// given than the parent path can absorb, and
/// [`UrlResolutionError::NoParentPath`] when the parent has no path at all.
///
/// # Examples
///
/// ```
/// use git_bundler::url::resolve;
///
/// let parent = "https://host.example/group/repo.git";
/// assert_eq!(
///     resolve("../library.git", parent).expect("resolvable"),
///     "https://host.example/library.git"
/// );
/// assert_eq!(
///     resolve("./lib.git", parent).expect("resolvable"),
///     "https://host.example/group/lib.git"
/// );
/// ```
pub fn resolve(raw_url: &str, parent_url: &str) -> Result<String, UrlResolutionError> {
    if !is_relative(raw_url) {
        return Ok(raw_url.to_owned());
    }

    let mut base = UrlBase::parse(parent_url);
    if base.segments.pop().is_none() {
        return Err(UrlResolutionError::NoParentPath {
            raw_url: raw_url.to_owned(),
            parent_url: parent_url.to_owned(),
        });
    }

    for segment in raw_url.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if base.segments.pop().is_none() {
                    return Err(UrlResolutionError::EscapesRoot {
                        raw_url: raw_url.to_owned(),
                        parent_url: parent_url.to_owned(),
                    });
                }
            }
            name => base.segments.push(name.to_owned()),
        }
    }

    Ok(base.render())
}

/// Derives a human-readable repository name from a URL or path.
///
/// Trailing slashes and a `.git` suffix are stripped and the final path
/// segment is used. Inputs without a usable segment (for example a bare
/// host) fall back to [`PLACEHOLDER_REPO_NAME`].
///
/// # Examples
///
/// ```
/// use git_bundler::url::repo_name;
///
/// assert_eq!(repo_name("https://github.com/user/repo.git"), "repo");
/// assert_eq!(repo_name("git@github.com:user/repo.git"), "repo");
/// assert_eq!(repo_name("/home/user/repo/"), "repo");
/// assert_eq!(repo_name("https://host.example"), "repository");
/// ```
#[must_use]
pub fn repo_name(url: &str) -> String {
    let base = UrlBase::parse(url);
    base.segments
        .last()
        .filter(|segment| !segment.is_empty())
        .cloned()
        .unwrap_or_else(|| PLACEHOLDER_REPO_NAME.to_owned())
}

/// Returns the form of `url` used to compare repositories for equality.
///
/// Trailing slashes and a `.git` suffix are ignored, so
/// `https://host/repo.git` and `https://host/repo/` compare equal.
#[must_use]
pub fn comparison_key(url: &str) -> String {
    strip_suffixes(url).to_owned()
}

fn strip_suffixes(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix(".git")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
}

/// A URL split into a root that can never be popped and its path segments.
#[derive(Debug, PartialEq, Eq)]
struct UrlBase {
    /// `scheme://authority/`, `user@host:`, `/`, or empty for relative paths.
    root: String,
    segments: Vec<String>,
}

impl UrlBase {
    fn parse(url: &str) -> Self {
        let normalised = strip_suffixes(url);
        let (root, path) = split_root(normalised);
        Self {
            root: root.to_owned(),
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    fn render(&self) -> String {
        format!("{}{}", self.root, self.segments.join("/"))
    }
}

/// Splits a normalised URL into `(root, path)`.
fn split_root(url: &str) -> (&str, &str) {
    if let Some(scheme_end) = url.find("://") {
        let after_scheme = scheme_end + "://".len();
        let rest = url.get(after_scheme..).unwrap_or_default();
        return match rest.find('/') {
            Some(slash) => url.split_at(after_scheme + slash + 1),
            None => (url, ""),
        };
    }

    if let Some(colon) = scp_colon(url) {
        let (root, path) = url.split_at(colon + 1);
        // `host:/abs/path` keeps its leading slash in the root.
        return match path.strip_prefix('/') {
            Some(rest) => (url.get(..=colon + 1).unwrap_or(root), rest),
            None => (root, path),
        };
    }

    match url.strip_prefix('/') {
        Some(path) => ("/", path),
        None => ("", url),
    }
}

/// Returns the position of the host/path separator of an scp-style URL.
///
/// Mirrors git's own rule: a colon counts only when no slash precedes it.
fn scp_colon(url: &str) -> Option<usize> {
    let colon = url.find(':')?;
    let slash = url.find('/');
    match slash {
        Some(slash) if slash < colon => None,
        _ => Some(colon),
    }
}
