//! Tests for the archive manifest schema.

use super::*;
use rstest::{fixture, rstest};
use serde_json::Value;
use tempfile::TempDir;

fn record(name: &str, path: &str) -> SubmoduleRecord {
    SubmoduleRecord {
        name: name.to_owned(),
        path: path.to_owned(),
        raw_url: format!("../{name}.git"),
        resolved_url: format!("https://host.example/{name}.git"),
    }
}

fn record_with_urls(raw_url: &str, resolved_url: &str) -> SubmoduleRecord {
    SubmoduleRecord {
        raw_url: raw_url.to_owned(),
        resolved_url: resolved_url.to_owned(),
        ..record("lib", "vendor/lib")
    }
}

#[fixture]
fn sample_provenance() -> ManifestProvenance {
    ManifestProvenance::new(
        "https://host.example/group/app.git",
        "app",
        CreatedAt::from_epoch_secs(1_700_000_000),
    )
}

#[fixture]
fn sample_content() -> ManifestContent {
    ManifestContent {
        compression: Compression::Zstd,
        has_lfs: true,
        submodules: vec![record("lib", "vendor/lib"), record("docs", "docs")],
    }
}

#[fixture]
fn sample_manifest(
    sample_provenance: ManifestProvenance,
    sample_content: ManifestContent,
) -> ArchiveManifest {
    ArchiveManifest::new(sample_provenance, sample_content)
}

#[rstest]
fn accessors_return_all_fields(sample_manifest: ArchiveManifest) {
    assert_eq!(
        sample_manifest.source_url(),
        "https://host.example/group/app.git"
    );
    assert_eq!(sample_manifest.repo_name(), "app");
    assert_eq!(sample_manifest.created_at().as_str(), "2023-11-14T22:13:20Z");
    assert_eq!(sample_manifest.tool_version(), FORMAT_VERSION);
    assert_eq!(sample_manifest.compression(), Compression::Zstd);
    assert!(sample_manifest.has_lfs());
    assert_eq!(sample_manifest.submodules().len(), 2);
}

#[rstest]
fn serialized_json_has_flat_keys_in_order(sample_manifest: ArchiveManifest) {
    let json = manifest_json(&sample_manifest).expect("serialization succeeds");
    let keys = [
        "\"source_url\"",
        "\"repo_name\"",
        "\"created_at\"",
        "\"tool_version\"",
        "\"compression\"",
        "\"has_lfs\"",
        "\"submodules\"",
    ];
    let positions: Vec<usize> = keys
        .iter()
        .map(|key| json.find(key).unwrap_or_else(|| panic!("missing key {key}")))
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

    let parsed: Value = serde_json::from_str(&json).expect("valid JSON");
    assert_eq!(parsed.get("compression").and_then(Value::as_str), Some("zstd"));
    let first = parsed
        .get("submodules")
        .and_then(Value::as_array)
        .and_then(|subs| subs.first())
        .expect("one submodule");
    assert_eq!(first.get("name").and_then(Value::as_str), Some("lib"));
    assert_eq!(first.get("raw_url").and_then(Value::as_str), Some("../lib.git"));
}

#[rstest]
fn parse_accepts_written_json(sample_manifest: ArchiveManifest) {
    let json = manifest_json(&sample_manifest).expect("serialize");
    let back = parse_manifest(&json).expect("parse");
    assert_eq!(back, sample_manifest);
}

#[rstest]
fn read_and_write_use_container_manifest(sample_manifest: ArchiveManifest) {
    let dir = TempDir::new().expect("tempdir");
    let container = Utf8Path::from_path(dir.path()).expect("utf8 tempdir");
    write_manifest(container, &sample_manifest).expect("write");
    assert!(container.join(MANIFEST_FILENAME).is_file());
    assert_eq!(read_manifest(container).expect("read"), sample_manifest);
}

#[test]
fn read_reports_missing_file() {
    let dir = TempDir::new().expect("tempdir");
    let container = Utf8Path::from_path(dir.path()).expect("utf8 tempdir");
    let err = read_manifest(container).expect_err("no manifest");
    assert!(matches!(err, ManifestError::Io { .. }));
}

#[rstest]
#[case::missing_field(r#"{"source_url": "x"}"#)]
#[case::not_json("not json")]
#[case::bad_compression(
    r#"{"source_url":"u","repo_name":"r","created_at":"2026-01-01T00:00:00Z","tool_version":"3.0","compression":"lzma","has_lfs":false,"submodules":[]}"#
)]
fn parse_rejects_malformed_json(#[case] json: &str) {
    assert!(matches!(parse_manifest(json), Err(ManifestError::Json(_))));
}

#[test]
fn parse_rejects_foreign_major_version() {
    let json = r#"{"source_url":"u","repo_name":"r","created_at":"2026-01-01T00:00:00Z","tool_version":"2.1","compression":"gz","has_lfs":false,"submodules":[]}"#;
    let err = parse_manifest(json).expect_err("version 2 is incompatible");
    assert!(matches!(
        err,
        ManifestError::IncompatibleVersion { ref found, .. } if found == "2.1"
    ));
}

#[rstest]
#[case::duplicate_names(vec![record("lib", "a"), record("lib", "b")])]
#[case::escaping_path(vec![record("lib", "../outside")])]
#[case::absolute_path(vec![record("lib", "/etc")])]
#[case::escaping_name(vec![record("../lib", "lib")])]
#[case::no_url(vec![record_with_urls("", "")])]
fn validate_rejects_bad_submodules(
    sample_provenance: ManifestProvenance,
    #[case] submodules: Vec<SubmoduleRecord>,
) {
    let manifest = ArchiveManifest::new(
        sample_provenance,
        ManifestContent {
            compression: Compression::Gz,
            has_lfs: false,
            submodules,
        },
    );
    assert!(matches!(
        manifest.validate(),
        Err(ManifestError::Invalid { .. })
    ));
}

#[rstest]
fn validate_accepts_record_with_only_raw_url(sample_provenance: ManifestProvenance) {
    let manifest = ArchiveManifest::new(
        sample_provenance,
        ManifestContent {
            compression: Compression::Gz,
            has_lfs: false,
            submodules: vec![record_with_urls("../lib.git", "")],
        },
    );
    assert!(manifest.validate().is_ok());
}

#[rstest]
fn validate_rejects_malformed_timestamp(sample_content: ManifestContent) {
    let mut provenance = ManifestProvenance::new("u", "r", CreatedAt::from_epoch_secs(0));
    provenance.created_at = CreatedAt("yesterday".to_owned());
    let manifest = ArchiveManifest::new(provenance, sample_content);
    assert!(matches!(
        manifest.validate(),
        Err(ManifestError::Invalid { .. })
    ));
}

#[rstest]
#[case::epoch(0, "1970-01-01T00:00:00Z")]
#[case::leap_day(951_782_400, "2000-02-29T00:00:00Z")]
#[case::end_of_year(1_704_067_199, "2023-12-31T23:59:59Z")]
#[case::recent(1_700_000_000, "2023-11-14T22:13:20Z")]
fn created_at_formats_epoch_seconds(#[case] secs: u64, #[case] expected: &str) {
    let ts = CreatedAt::from_epoch_secs(secs);
    assert_eq!(ts.as_str(), expected);
    assert!(ts.is_well_formed());
}

#[test]
fn created_at_now_is_well_formed() {
    assert!(CreatedAt::now().is_well_formed());
}

#[test]
fn file_stamp_is_compact() {
    assert_eq!(CreatedAt::from_epoch_secs(0).file_stamp(), "19700101_000000");
}

#[rstest]
#[case::gz(Compression::Gz, "gz", "tar.gz")]
#[case::zstd(Compression::Zstd, "zstd", "tar.zst")]
fn compression_names(#[case] compression: Compression, #[case] label: &str, #[case] ext: &str) {
    assert_eq!(compression.to_string(), label);
    assert_eq!(compression.extension(), ext);
}

#[test]
fn zstd_is_the_default_compression() {
    assert_eq!(Compression::default(), Compression::Zstd);
}
