use crate::ipc::error::{from_error, ok};
use crate::ipc::helpers::{db_conn, lesson_key, target_student, to_value};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, StudentProgressEntry};
use serde_json::{json, Value};

/// Entry plus its current-catalog status.
fn entry_json(state: &AppState, req: &Request, e: &StudentProgressEntry) -> Result<Value, Value> {
    let mut v = to_value(req, e)?;
    let lesson = state.catalog.get_lesson(e.key()).ok();
    v["orphaned"] = json!(lesson.is_none());
    v["title"] = json!(lesson.map(|l| l.title.clone()));
    Ok(v)
}

fn handle_mark(state: &mut AppState, req: &Request, completed: bool) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match target_student(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let key = match lesson_key(req) {
        Ok(k) => k,
        Err(e) => return e,
    };
    let res = if completed {
        ledger::mark_complete(conn, &state.catalog, &student_id, key)
    } else {
        ledger::mark_incomplete(conn, &state.catalog, &student_id, key)
    };
    match res {
        Ok(entry) => match entry_json(state, req, &entry) {
            Ok(v) => ok(&req.id, json!({ "entry": v })),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

fn handle_set_note(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match target_student(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let key = match lesson_key(req) {
        Ok(k) => k,
        Err(e) => return e,
    };
    let note = req.params.get("note").and_then(|v| v.as_str());
    match ledger::set_note(conn, &state.catalog, &student_id, key, note) {
        Ok(entry) => match entry_json(state, req, &entry) {
            Ok(v) => ok(&req.id, json!({ "entry": v })),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match target_student(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entries = match ledger::list_for_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return from_error(&req.id, &e),
    };
    let mut rows = Vec::with_capacity(entries.len());
    for e in &entries {
        match entry_json(state, req, e) {
            Ok(v) => rows.push(v),
            Err(resp) => return resp,
        }
    }
    ok(&req.id, json!({ "studentId": student_id, "entries": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "progress.markComplete" => Some(handle_mark(state, req, true)),
        "progress.markIncomplete" => Some(handle_mark(state, req, false)),
        "progress.setNote" => Some(handle_set_note(state, req)),
        "progress.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
