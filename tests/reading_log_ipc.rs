mod test_support;

use serde_json::json;
use test_support::{
    bootstrap_class, request_err, request_ok, sample_lessons, spawn_sidecar, temp_dir,
};

#[test]
fn reading_log_validates_and_lists_newest_first() {
    let workspace = temp_dir("classroom-reading-log");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    bootstrap_class(&mut stdin, &mut reader, workspace.path(), sample_lessons());
    request_ok(&mut stdin, &mut reader, "0", "session.login", json!({ "name": "anna", "password": "secret1" }));

    let empty_title = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "readingLog.add",
        json!({ "entry": { "title": "", "author": "X" } }),
    );
    assert_eq!(empty_title, "validation_error");

    for (i, entry) in [
        json!({ "title": "Tintin", "author": "   " }),
        json!({ "title": "Tintin", "author": "Hergé", "rating": 6 }),
        json!({ "title": "Tintin", "author": "Hergé", "pagesRead": -1 }),
        json!({ "title": "Tintin", "author": "Hergé", "readingDate": "12/10/2026" }),
    ]
    .into_iter()
    .enumerate()
    {
        let code = request_err(
            &mut stdin,
            &mut reader,
            &format!("v{}", i),
            "readingLog.add",
            json!({ "entry": entry }),
        );
        assert_eq!(code, "validation_error");
    }

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "readingLog.add",
        json!({ "entry": {
            "title": "Le Petit Prince",
            "author": "Antoine de Saint-Exupéry",
            "pagesRead": 30,
            "totalPages": 96,
            "rating": 4,
            "evaluation": "J'ai aimé",
            "reflection": "Le renard",
            "readingDate": "2026-10-12"
        } }),
    );
    assert!(first["entry"]["id"].as_i64().expect("id") > 0);
    assert_eq!(first["entry"]["readingDate"], json!("2026-10-12"));

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "readingLog.add",
        json!({ "entry": { "title": "Astérix", "author": "Goscinny", "pagesRead": 20, "rating": 5 } }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "readingLog.add",
        json!({ "entry": { "title": "Notes", "author": "Moi", "pagesRead": 0 } }),
    );

    let list = request_ok(&mut stdin, &mut reader, "5", "readingLog.list", json!({}));
    let titles: Vec<&str> = list["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|e| e["title"].as_str().expect("title"))
        .collect();
    assert_eq!(titles, vec!["Notes", "Astérix", "Le Petit Prince"]);

    let summary = request_ok(&mut stdin, &mut reader, "6", "readingLog.summary", json!({}));
    assert_eq!(summary["booksLogged"], json!(3));
    assert_eq!(summary["totalPagesRead"], json!(50));
    assert_eq!(summary["averageRating"], json!(4.5));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn teachers_read_any_log_students_only_their_own() {
    let workspace = temp_dir("classroom-reading-access");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (anna, ben) = bootstrap_class(&mut stdin, &mut reader, workspace.path(), sample_lessons());

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "readingLog.add",
        json!({ "studentId": ben, "entry": { "title": "Bob", "author": "Anon" } }),
    );
    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "readingLog.summary",
        json!({ "studentId": anna }),
    );
    assert_eq!(empty["booksLogged"], json!(0));
    assert_eq!(empty["averageRating"], json!(null));

    request_ok(&mut stdin, &mut reader, "3", "session.login", json!({ "name": "anna", "password": "secret1" }));
    let denied = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "readingLog.list",
        json!({ "studentId": ben }),
    );
    assert_eq!(denied, "unauthorized");

    drop(stdin);
    let _ = child.wait();
}
