#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub fn temp_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("create temp dir")
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classroomd");
    let mut child = Command::new(exe)
        .env_remove("CLASSROOMD_WORKSPACE")
        .env("CLASSROOMD_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classroomd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

/// Returns the error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn user_id(result: &Value) -> String {
    result
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("user.id")
        .to_string()
}

/// Selects `workspace`, creates the bootstrap teacher "prof" plus students
/// "anna" and "ben" (password "secret1"), publishes `lessons` and leaves the
/// teacher signed in. Returns (anna_id, ben_id).
pub fn bootstrap_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
    lessons: Value,
) -> (String, String) {
    request_ok(
        stdin,
        reader,
        "boot-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        stdin,
        reader,
        "boot-t",
        "users.register",
        json!({ "name": "prof", "password": "secret1", "role": "teacher" }),
    );
    let anna = request_ok(
        stdin,
        reader,
        "boot-a",
        "users.register",
        json!({ "name": "anna", "password": "secret1", "role": "student" }),
    );
    let ben = request_ok(
        stdin,
        reader,
        "boot-b",
        "users.register",
        json!({ "name": "ben", "password": "secret1", "role": "student" }),
    );
    request_ok(
        stdin,
        reader,
        "boot-login",
        "session.login",
        json!({ "name": "prof", "password": "secret1" }),
    );
    request_ok(
        stdin,
        reader,
        "boot-publish",
        "catalog.publish",
        json!({ "label": "rentrée", "lessons": lessons }),
    );
    (user_id(&anna), user_id(&ben))
}

/// Four LIRE lessons (1..=4) and four ECRIRE lessons (5..=8) in French,
/// plus two math lessons.
pub fn sample_lessons() -> Value {
    let mut lessons = Vec::new();
    for seq in 1..=8 {
        let tag = if seq <= 4 { "LIRE" } else { "ECRIRE" };
        let month = if seq <= 4 { "Septembre" } else { "Octobre" };
        lessons.push(json!({
            "subject": "french",
            "seq": seq,
            "title": format!("Français {}", seq),
            "competencies": [tag],
            "month": month,
            "content": if seq == 3 { "Lecture du conte" } else { "" },
        }));
    }
    lessons.push(json!({
        "subject": "math",
        "seq": 1,
        "title": "Fractions",
        "competencies": "C1, C3",
        "durationMinutes": 60,
        "month": "Septembre",
    }));
    lessons.push(json!({
        "subject": "math",
        "seq": 2,
        "title": "Problèmes",
        "competencies": ["C2"],
        "month": "Octobre",
    }));
    Value::Array(lessons)
}
