//! Test support utilities for bundler integration tests.
//!
//! These helpers build throwaway git repositories on disk, wire submodules
//! between them without touching the network, and package hand-made archive
//! containers for the failure-path scenarios.

#![allow(dead_code, reason = "each test crate uses a different subset")]

use camino::{Utf8Path, Utf8PathBuf};
use git_bundler::manifest::{
    ArchiveManifest, Compression, CreatedAt, ManifestContent, ManifestProvenance, write_manifest,
};
use git_bundler::packaging::package_container;
use rstest::fixture;
use std::process::Command;
use tempfile::TempDir;

/// Options passed to every fixture git invocation so the host configuration
/// cannot leak into commits.
const GIT_FIXTURE_CONFIG: &[&str] = &[
    "-c",
    "user.name=Bundler Tests",
    "-c",
    "user.email=tests@example.invalid",
    "-c",
    "init.defaultBranch=main",
    "-c",
    "commit.gpgsign=false",
    "-c",
    "protocol.file.allow=always",
];

/// Returns `true` when a `git` binary can be executed.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Returns `true` when both `git` and the `git-lfs` extension can be run.
pub fn git_lfs_available() -> bool {
    git_available()
        && Command::new("git")
            .args(["lfs", "version"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
}

/// A temporary directory with a canonical UTF-8 root.
pub struct Scratch {
    _dir: TempDir,
    /// Canonicalised path of the directory.
    pub root: Utf8PathBuf,
}

/// Creates a fresh scratch directory.
#[fixture]
pub fn scratch() -> Scratch {
    let dir = TempDir::new().expect("failed to create temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize().expect("canonical temp dir"))
        .expect("temp dir should be UTF-8");
    Scratch { _dir: dir, root }
}

/// Runs git in `dir` and returns its trimmed stdout, panicking on failure.
pub fn git(dir: &Utf8Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(GIT_FIXTURE_CONFIG)
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {} failed in {dir}: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

/// Initialises a repository at `path`, commits `files`, and returns the
/// commit SHA.
pub fn init_repo(path: &Utf8Path, files: &[(&str, &str)]) -> String {
    std::fs::create_dir_all(path).expect("create repo dir");
    git(path, &["init", "--quiet"]);
    for (name, contents) in files {
        let file = path.join(name);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&file, contents).expect("write fixture file");
    }
    git(path, &["add", "--all"]);
    git(path, &["commit", "--quiet", "-m", "initial"]);
    head(path)
}

/// Initialises a repository at `path` whose `*.bin` files are stored in
/// LFS, commits `files`, and returns the commit SHA.
///
/// The LFS filters are installed into the repository config only, so the
/// host's global configuration is left alone.
pub fn init_lfs_repo(path: &Utf8Path, files: &[(&str, &[u8])]) -> String {
    std::fs::create_dir_all(path).expect("create repo dir");
    git(path, &["init", "--quiet"]);
    git(path, &["lfs", "install", "--local"]);
    git(path, &["lfs", "track", "*.bin"]);
    for (name, contents) in files {
        std::fs::write(path.join(name), contents).expect("write fixture file");
    }
    git(path, &["add", "--all"]);
    git(path, &["commit", "--quiet", "-m", "add LFS content"]);
    head(path)
}

/// Returns `len` bytes of deterministic, poorly compressible content.
pub fn binary_payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_le_bytes()[0]
        })
        .collect()
}

/// Returns the SHA of `HEAD` in `repo`.
pub fn head(repo: &Utf8Path) -> String {
    git(repo, &["rev-parse", "HEAD"])
}

/// Records `url` at `commit` as submodule `name` checked out at `path`, and
/// commits the change. Returns the new commit SHA of `repo`.
///
/// The gitlink is written straight into the index, so the submodule
/// repository is never cloned into `repo`.
pub fn add_gitlink(repo: &Utf8Path, name: &str, path: &str, url: &str, commit: &str) -> String {
    let path_key = format!("submodule.{name}.path");
    let url_key = format!("submodule.{name}.url");
    git(repo, &["config", "-f", ".gitmodules", &path_key, path]);
    git(repo, &["config", "-f", ".gitmodules", &url_key, url]);

    let cacheinfo = format!("160000,{commit},{path}");
    git(repo, &["update-index", "--add", "--cacheinfo", &cacheinfo]);
    git(repo, &["add", ".gitmodules"]);
    git(repo, &["commit", "--quiet", "-m", &format!("add submodule {name}")]);
    head(repo)
}

/// Builds a manifest for a hand-made container.
pub fn manifest_for(repo_name: &str, compression: Compression) -> ArchiveManifest {
    ArchiveManifest::new(
        ManifestProvenance::new(
            format!("https://host.example/{repo_name}.git"),
            repo_name,
            CreatedAt::from_epoch_secs(1_700_000_000),
        ),
        ManifestContent {
            compression,
            has_lfs: false,
            submodules: Vec::new(),
        },
    )
}

/// Which top-level entries a hand-made container should include.
#[derive(Debug, Clone, Copy)]
pub struct ContainerParts {
    /// Whether `manifest.json` is written.
    pub manifest: bool,
    /// Whether a `repo.git` directory is created.
    pub repository: bool,
}

/// Packages a hand-made container into `root/<name>` and returns the
/// archive path.
pub fn package_fixture(root: &Utf8Path, name: &str, parts: ContainerParts) -> Utf8PathBuf {
    let container = root.join(format!("{name}.container"));
    std::fs::create_dir_all(&container).expect("create container");
    if parts.repository {
        let mirror = container.join("repo.git");
        std::fs::create_dir_all(&mirror).expect("create mirror");
        std::fs::write(mirror.join("HEAD"), "ref: refs/heads/main\n").expect("write HEAD");
    }
    if parts.manifest {
        write_manifest(&container, &manifest_for("app", Compression::Gz)).expect("write manifest");
    } else {
        std::fs::write(container.join("README"), "not a manifest\n").expect("write filler");
    }

    let archive = root.join(name);
    package_container(&container, &archive, Compression::Gz).expect("package container");
    archive
}

/// Truncates `file` to half its length.
pub fn truncate_half(file: &Utf8Path) {
    let len = std::fs::metadata(file).expect("metadata").len();
    let handle = std::fs::OpenOptions::new()
        .write(true)
        .open(file)
        .expect("open for truncation");
    handle.set_len(len / 2).expect("truncate");
}
