mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use test_support::{
    bootstrap_class, request_err, request_ok, sample_lessons, spawn_sidecar, temp_dir,
};

#[test]
fn export_then_import_restores_the_snapshot() {
    let workspace = temp_dir("classroom-backup");
    let out = temp_dir("classroom-backup-out");
    let bundle = out.path().join("classroom.backup.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (anna, _ben) = bootstrap_class(&mut stdin, &mut reader, workspace.path(), sample_lessons());

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "progress.markComplete",
        json!({ "studentId": anna, "subject": "french", "seq": 1 }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], json!("classroom-workspace-v1"));
    let digest = exported["dbSha256"].as_str().expect("digest").to_string();
    assert_eq!(digest.len(), 64);

    let mut archive = zip::ZipArchive::new(File::open(&bundle).expect("open bundle")).expect("zip");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(&digest));
    archive.by_name("db/classroom.sqlite3").expect("db entry");

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "progress.markComplete",
        json!({ "studentId": anna, "subject": "french", "seq": 2 }),
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormatDetected"], json!("classroom-workspace-v1"));
    assert_eq!(imported["catalogVersion"], json!(1));

    // Reopening the workspace ends the session.
    let signed_out = request_err(&mut stdin, &mut reader, "5", "session.current", json!({}));
    assert_eq!(signed_out, "unauthenticated");

    request_ok(&mut stdin, &mut reader, "6", "session.login", json!({ "name": "prof", "password": "secret1" }));
    let list = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "progress.list",
        json!({ "studentId": anna }),
    );
    let entries = list["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["seq"], json!(1));

    drop(stdin);
    let _ = child.wait();
}

fn write_bundle(path: &std::path::Path, manifest: serde_json::Value, db: &[u8]) {
    let mut zip = zip::ZipWriter::new(File::create(path).expect("create bundle"));
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("manifest");
    zip.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    zip.start_file("db/classroom.sqlite3", opts).expect("db entry");
    zip.write_all(db).expect("write db");
    zip.finish().expect("finish bundle");
}

#[test]
fn broken_bundles_are_rejected_and_workspace_stays_usable() {
    let workspace = temp_dir("classroom-backup-bad");
    let out = temp_dir("classroom-backup-bad-out");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (anna, _ben) = bootstrap_class(&mut stdin, &mut reader, workspace.path(), sample_lessons());
    request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "progress.markComplete",
        json!({ "studentId": anna, "subject": "french", "seq": 1 }),
    );

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "backup.import",
        json!({ "inPath": out.path().join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(missing, "io_failed");

    let garbage = out.path().join("notes.txt");
    std::fs::write(&garbage, "this is a text file, not a backup").expect("write garbage");
    let rejected = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "backup.import",
        json!({ "inPath": garbage.to_string_lossy() }),
    );
    assert_eq!(rejected, "io_failed");

    let tampered = out.path().join("tampered.zip");
    write_bundle(
        &tampered,
        json!({ "format": "classroom-workspace-v1", "dbSha256": "0".repeat(64) }),
        b"SQLite format 3\0tampered",
    );
    let mismatch = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "backup.import",
        json!({ "inPath": tampered.to_string_lossy() }),
    );
    assert_eq!(mismatch, "io_failed");

    // Still signed in as the teacher, with the live data untouched.
    let current = request_ok(&mut stdin, &mut reader, "4", "session.current", json!({}));
    assert_eq!(current["user"]["name"], json!("prof"));
    assert_eq!(current["user"]["role"], json!("teacher"));

    let list = request_ok(&mut stdin, &mut reader, "5", "catalog.list", json!({}));
    assert_eq!(list["lessons"].as_array().expect("lessons").len(), 10);
    let progress = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "progress.list",
        json!({ "studentId": anna }),
    );
    assert_eq!(progress["entries"].as_array().expect("entries").len(), 1);

    drop(stdin);
    let _ = child.wait();
}
