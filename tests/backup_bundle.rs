use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::ZipWriter;

#[path = "../src/backup.rs"]
mod backup;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn seed_workspace(root: &PathBuf, db_bytes: &[u8]) -> PathBuf {
    let workspace = root.join("workspace");
    std::fs::create_dir_all(&workspace).expect("create workspace");
    std::fs::write(workspace.join("seatsync.sqlite3"), db_bytes).expect("write db");
    workspace
}

#[test]
fn export_then_import_restores_the_database() {
    let root = temp_dir("seatsync-bundle-roundtrip");
    let db_bytes = b"pretend sqlite payload for the roundtrip";
    let src = seed_workspace(&root, db_bytes);
    let bundle = root.join("backup.ssbackup.zip");

    let summary = backup::export_workspace_bundle(&src, &bundle).expect("export");
    assert_eq!(summary.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(summary.db_sha256.len(), 64);

    let dst = root.join("restored");
    let imported = backup::import_workspace_bundle(&bundle, &dst).expect("import");
    assert_eq!(imported.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    let restored = std::fs::read(dst.join("seatsync.sqlite3")).expect("read restored db");
    assert_eq!(restored, db_bytes);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn plain_sqlite_file_is_accepted_as_legacy_backup() {
    let root = temp_dir("seatsync-bundle-legacy");
    let legacy = root.join("old-backup.sqlite3");
    let db_bytes = b"SQLite format 3\0and then some";
    std::fs::write(&legacy, db_bytes).expect("write legacy backup");

    let dst = root.join("restored");
    let imported = backup::import_workspace_bundle(&legacy, &dst).expect("legacy import");
    assert_eq!(imported.bundle_format_detected, "legacy-sqlite3");
    let restored = std::fs::read(dst.join("seatsync.sqlite3")).expect("read restored db");
    assert_eq!(restored.as_slice(), db_bytes.as_slice());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn unknown_bundle_format_is_rejected() {
    let root = temp_dir("seatsync-bundle-badformat");
    let bundle = root.join("foreign.zip");

    let file = std::fs::File::create(&bundle).expect("create bundle");
    let mut zip = ZipWriter::new(file);
    zip.start_file("manifest.json", FileOptions::default())
        .expect("start manifest");
    zip.write_all(
        json!({ "format": "some-other-app-v9", "version": 9 })
            .to_string()
            .as_bytes(),
    )
    .expect("write manifest");
    zip.start_file("db/seatsync.sqlite3", FileOptions::default())
        .expect("start db entry");
    zip.write_all(b"bytes").expect("write db entry");
    zip.finish().expect("finish zip");

    let dst = root.join("restored");
    let err = backup::import_workspace_bundle(&bundle, &dst).expect_err("wrong format");
    assert!(
        err.to_string().contains("unsupported bundle format"),
        "got: {err:#}"
    );
    assert!(!dst.join("seatsync.sqlite3").exists());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn checksum_mismatch_is_rejected() {
    let root = temp_dir("seatsync-bundle-checksum");
    let bundle = root.join("tampered.zip");

    let file = std::fs::File::create(&bundle).expect("create bundle");
    let mut zip = ZipWriter::new(file);
    zip.start_file("manifest.json", FileOptions::default())
        .expect("start manifest");
    zip.write_all(
        json!({
            "format": backup::BUNDLE_FORMAT_V1,
            "version": 1,
            "dbSha256": "0000000000000000000000000000000000000000000000000000000000000000",
        })
        .to_string()
        .as_bytes(),
    )
    .expect("write manifest");
    zip.start_file("db/seatsync.sqlite3", FileOptions::default())
        .expect("start db entry");
    zip.write_all(b"these bytes do not match the manifest digest")
        .expect("write db entry");
    zip.finish().expect("finish zip");

    let dst = root.join("restored");
    let err = backup::import_workspace_bundle(&bundle, &dst).expect_err("checksum mismatch");
    assert!(
        err.to_string().contains("checksum mismatch"),
        "got: {err:#}"
    );
    assert!(!dst.join("seatsync.sqlite3").exists());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn export_without_a_database_fails() {
    let root = temp_dir("seatsync-bundle-nodb");
    let workspace = root.join("empty-workspace");
    std::fs::create_dir_all(&workspace).expect("create workspace");

    let err = backup::export_workspace_bundle(&workspace, &root.join("out.zip"))
        .expect_err("no database");
    assert!(
        err.to_string().contains("workspace database not found"),
        "got: {err:#}"
    );

    let _ = std::fs::remove_dir_all(root);
}
