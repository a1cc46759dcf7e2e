//! Names of the entries inside an archive container.
//!
//! A container is a directory with this layout, both at the top of an
//! archive and for every nested submodule:
//!
//! ```text
//! manifest.json
//! repo.git/              mirror clone
//! lfs/                   optional LFS object store
//! submodules/<name>/     optional nested containers
//! ```
//!
//! A submodule name becomes a single directory name: `%` and `/` are
//! percent-escaped, so `libs` and `libs/core` never share a directory.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// File name of the manifest at the root of every container.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Directory holding the mirror clone.
pub const REPOSITORY_DIRNAME: &str = "repo.git";

/// Directory holding the captured LFS object store.
pub const LFS_DIRNAME: &str = "lfs";

/// Directory holding nested submodule containers.
pub const SUBMODULES_DIRNAME: &str = "submodules";

/// Returns `true` when `path` is a non-empty relative path made only of
/// normal components, so joining it onto a directory cannot escape it.
///
/// # Examples
///
/// ```
/// use git_bundler::layout::is_safe_relative;
///
/// assert!(is_safe_relative("libs/core"));
/// assert!(!is_safe_relative("../escape"));
/// assert!(!is_safe_relative("/etc"));
/// assert!(!is_safe_relative(""));
/// ```
#[must_use]
pub fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && !path.split('/').any(str::is_empty)
        && Utf8Path::new(path)
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(_)))
}

/// Returns the nested container directory for submodule `name`, or `None`
/// when the name cannot be used as a relative path.
///
/// # Examples
///
/// ```
/// use camino::{Utf8Path, Utf8PathBuf};
/// use git_bundler::layout::submodule_container;
///
/// assert_eq!(
///     submodule_container(Utf8Path::new("/c"), "libs/core"),
///     Some(Utf8PathBuf::from("/c/submodules/libs%2Fcore"))
/// );
/// ```
#[must_use]
pub fn submodule_container(container: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    is_safe_relative(name).then(|| {
        container
            .join(SUBMODULES_DIRNAME)
            .join(container_dirname(name))
    })
}

/// Escapes `name` into one path component.
fn container_dirname(name: &str) -> String {
    let mut dirname = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '%' => dirname.push_str("%25"),
            '/' => dirname.push_str("%2F"),
            other => dirname.push(other),
        }
    }
    dirname
}
