//! End-to-end archive, unpack and verify runs against real git repositories.
//!
//! Every repository lives in a temporary directory and submodules point at
//! local paths, so no network access is needed. Tests return early when no
//! `git` binary is available.

mod support;

use camino::Utf8Path;
use git_bundler::archiver::{ArchiveOutcome, ArchiveRequest, Archiver};
use git_bundler::command::SystemCommandExecutor;
use git_bundler::manifest::Compression;
use git_bundler::unpacker::Unpacker;
use git_bundler::verifier::Verifier;
use git_bundler::warning::Warning;
use rstest::rstest;
use std::process::Command;
use support::{
    Scratch, add_gitlink, binary_payload, git, git_available, git_lfs_available, head,
    init_lfs_repo, init_repo, scratch, truncate_half,
};

macro_rules! require_git {
    () => {
        if !git_available() {
            eprintln!("Skipping test because git is not installed.");
            return;
        }
    };
}

macro_rules! require_git_lfs {
    () => {
        if !git_lfs_available() {
            eprintln!("Skipping test because git-lfs is not installed.");
            return;
        }
    };
}

/// Repositories of a three-level fixture: app -> lib -> deep.
struct Nested {
    app: camino::Utf8PathBuf,
    lib_head: String,
    deep_head: String,
}

fn nested_fixture(root: &Utf8Path) -> Nested {
    let deep = root.join("hosts/deep");
    let deep_head = init_repo(&deep, &[("deep.txt", "deep\n")]);

    let lib = root.join("hosts/lib");
    init_repo(&lib, &[("lib.txt", "lib\n")]);
    let lib_head = add_gitlink(&lib, "deep", "deep", deep.as_str(), &deep_head);

    let app = root.join("hosts/app");
    init_repo(&app, &[("app.txt", "app\n"), ("docs/readme.md", "# app\n")]);
    git(&app, &["branch", "feature"]);
    git(&app, &["tag", "v1.0.0"]);
    add_gitlink(&app, "lib", "vendor/lib", lib.as_str(), &lib_head);

    Nested {
        app,
        lib_head,
        deep_head,
    }
}

fn archive(source: &Utf8Path, output_dir: &Utf8Path, compression: Compression) -> ArchiveOutcome {
    let executor = SystemCommandExecutor::default();
    let request = ArchiveRequest {
        source_url: source.to_string(),
        output_dir: output_dir.to_owned(),
        compression,
        verify_after: false,
    };
    Archiver::new(&executor)
        .archive(&request)
        .expect("archive should succeed")
}

#[rstest]
#[case::zstd(Compression::Zstd)]
#[case::gzip(Compression::Gz)]
fn nested_submodules_survive_a_round_trip(scratch: Scratch, #[case] compression: Compression) {
    require_git!();
    let fixture = nested_fixture(&scratch.root);

    let outcome = archive(&fixture.app, &scratch.root.join("out"), compression);
    assert!(
        outcome
            .archive_path
            .as_str()
            .ends_with(compression.extension())
    );
    assert_eq!(outcome.manifest.repo_name(), "app");
    assert_eq!(outcome.manifest.source_url(), fixture.app.as_str());
    let names: Vec<&str> = outcome
        .manifest
        .submodules()
        .iter()
        .map(|record| record.name.as_str())
        .collect();
    assert_eq!(names, vec!["lib"]);

    let executor = SystemCommandExecutor::default();
    let restored = Unpacker::new(&executor)
        .unpack(&outcome.archive_path, &scratch.root.join("restore"))
        .expect("unpack should succeed");
    let repo = restored.repository;
    assert_eq!(repo, scratch.root.join("restore/app"));

    assert!(repo.join("app.txt").is_file());
    assert!(repo.join("docs/readme.md").is_file());
    assert!(repo.join("vendor/lib/lib.txt").is_file());
    assert!(repo.join("vendor/lib/deep/deep.txt").is_file());
    assert_eq!(head(&repo.join("vendor/lib")), fixture.lib_head);
    assert_eq!(head(&repo.join("vendor/lib/deep")), fixture.deep_head);
}

#[rstest]
fn restored_repository_keeps_refs_and_origin(scratch: Scratch) {
    require_git!();
    let fixture = nested_fixture(&scratch.root);
    let outcome = archive(&fixture.app, &scratch.root.join("out"), Compression::Zstd);

    let executor = SystemCommandExecutor::default();
    let repo = Unpacker::new(&executor)
        .unpack(&outcome.archive_path, &scratch.root.join("restore"))
        .expect("unpack should succeed")
        .repository;

    assert_eq!(git(&repo, &["remote", "get-url", "origin"]), fixture.app.as_str());
    git(&repo, &["rev-parse", "--verify", "refs/remotes/origin/feature"]);
    git(&repo, &["rev-parse", "--verify", "refs/tags/v1.0.0"]);
    assert_eq!(
        git(&repo.join("vendor/lib"), &["config", "--get", "remote.origin.url"]),
        scratch.root.join("hosts/lib").as_str()
    );
}

#[rstest]
fn unpacking_twice_gives_identical_trees(scratch: Scratch) {
    require_git!();
    let fixture = nested_fixture(&scratch.root);
    let outcome = archive(&fixture.app, &scratch.root.join("out"), Compression::Zstd);
    let executor = SystemCommandExecutor::default();
    let unpacker = Unpacker::new(&executor);

    let first = unpacker
        .unpack(&outcome.archive_path, &scratch.root.join("first"))
        .expect("first unpack")
        .repository;
    let second = unpacker
        .unpack(&outcome.archive_path, &scratch.root.join("second"))
        .expect("second unpack")
        .repository;

    assert_eq!(head(&first), head(&second));
    assert_eq!(
        git(&first, &["submodule", "status", "--recursive"]),
        git(&second, &["submodule", "status", "--recursive"])
    );
}

#[rstest]
fn fresh_archive_verifies_clean(scratch: Scratch) {
    require_git!();
    let fixture = nested_fixture(&scratch.root);
    let executor = SystemCommandExecutor::default();
    let request = ArchiveRequest {
        source_url: fixture.app.to_string(),
        output_dir: scratch.root.join("out"),
        compression: Compression::Zstd,
        verify_after: true,
    };

    let outcome = Archiver::new(&executor)
        .archive(&request)
        .expect("archive should succeed");

    let report = outcome.verification.expect("verification requested");
    assert!(report.is_ok(), "{:?}", report.failures);
    assert!(Verifier::new(&executor).verify(&outcome.archive_path).is_ok());
}

#[rstest]
fn unreachable_submodule_is_skipped_with_a_warning(scratch: Scratch) {
    require_git!();
    let lib = scratch.root.join("hosts/lib");
    let lib_head = init_repo(&lib, &[("lib.txt", "lib\n")]);
    let app = scratch.root.join("hosts/app");
    init_repo(&app, &[("app.txt", "app\n")]);
    let missing = scratch.root.join("hosts/missing");
    add_gitlink(&app, "gone", "vendor/gone", missing.as_str(), &lib_head);

    let outcome = archive(&app, &scratch.root.join("out"), Compression::Gz);

    assert!(outcome.manifest.submodules().is_empty());
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::SubmoduleSkipped { name, .. } if name == "gone"))
    );

    let executor = SystemCommandExecutor::default();
    let restored = Unpacker::new(&executor)
        .unpack(&outcome.archive_path, &scratch.root.join("restore"))
        .expect("unpack should succeed");
    assert!(restored.repository.join("app.txt").is_file());
}

#[rstest]
fn recursive_submodule_is_archived_once(scratch: Scratch) {
    require_git!();
    let app = scratch.root.join("hosts/app");
    let app_first = init_repo(&app, &[("app.txt", "app\n")]);
    let lib = scratch.root.join("hosts/lib");
    init_repo(&lib, &[("lib.txt", "lib\n")]);
    let lib_head = add_gitlink(&lib, "app", "app", app.as_str(), &app_first);
    add_gitlink(&app, "lib", "lib", lib.as_str(), &lib_head);

    let outcome = archive(&app, &scratch.root.join("out"), Compression::Zstd);

    assert_eq!(outcome.manifest.submodules().len(), 1);
    assert!(outcome.warnings.iter().any(|w| matches!(
        w,
        Warning::SubmoduleSkipped { name, reason } if name == "app" && reason.contains("recursive")
    )));
}

#[rstest]
fn corrupted_artifact_fails_verification_and_unpack(scratch: Scratch) {
    require_git!();
    let fixture = nested_fixture(&scratch.root);
    let outcome = archive(&fixture.app, &scratch.root.join("out"), Compression::Zstd);
    truncate_half(&outcome.archive_path);

    let executor = SystemCommandExecutor::default();
    let report = Verifier::new(&executor).verify(&outcome.archive_path);
    assert!(!report.is_ok());

    let result = Unpacker::new(&executor)
        .unpack(&outcome.archive_path, &scratch.root.join("restore"));
    assert!(result.is_err());
}

#[rstest]
fn cli_prints_the_restored_path(scratch: Scratch) {
    require_git!();
    let fixture = nested_fixture(&scratch.root);
    let outcome = archive(&fixture.app, &scratch.root.join("out"), Compression::Gz);
    let dest = scratch.root.join("cli-restore");

    let output = Command::new(env!("CARGO_BIN_EXE_git-bundler"))
        .args(["unpack", outcome.archive_path.as_str(), "--dest", dest.as_str()])
        .output()
        .expect("failed to run git-bundler");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        dest.join("app").as_str()
    );
}

#[rstest]
fn cli_verify_of_missing_archive_exits_one(scratch: Scratch) {
    require_git!();
    let output = Command::new(env!("CARGO_BIN_EXE_git-bundler"))
        .args(["verify", scratch.root.join("absent.tar.zst").as_str()])
        .output()
        .expect("failed to run git-bundler");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("verification failed"));
}

#[rstest]
fn lfs_content_survives_a_round_trip(scratch: Scratch) {
    require_git_lfs!();
    let payload = binary_payload(1024 * 1024);
    let app = scratch.root.join("hosts/app");
    init_lfs_repo(&app, &[("large_file.bin", &payload), ("notes.txt", b"plain\n")]);
    let executor = SystemCommandExecutor::default();
    let request = ArchiveRequest {
        source_url: app.to_string(),
        output_dir: scratch.root.join("out"),
        compression: Compression::Zstd,
        verify_after: true,
    };

    let outcome = Archiver::new(&executor)
        .archive(&request)
        .expect("archive should succeed");

    assert!(outcome.manifest.has_lfs(), "{:?}", outcome.warnings);
    let report = outcome.verification.as_ref().expect("verification requested");
    assert!(report.is_ok(), "{:?}", report.failures);

    let restored = Unpacker::new(&executor)
        .unpack(&outcome.archive_path, &scratch.root.join("restore"))
        .expect("unpack should succeed");
    assert!(restored.warnings.is_empty(), "{:?}", restored.warnings);

    let large_file = restored.repository.join("large_file.bin");
    let metadata = std::fs::metadata(&large_file).expect("LFS file restored");
    assert_eq!(metadata.len(), 1024 * 1024);
    assert!(std::fs::read(&large_file).expect("read LFS file") == payload);
    assert_eq!(
        std::fs::read_to_string(restored.repository.join("notes.txt")).expect("read notes"),
        "plain\n"
    );
}
