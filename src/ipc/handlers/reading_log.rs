use crate::ipc::error::{err, from_error, ok};
use crate::ipc::helpers::{db_conn, target_student, to_value};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, ReadingLogInput};
use serde_json::{json, Value};

fn handle_add(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match target_student(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: ReadingLogInput = match req.params.get("entry") {
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(i) => i,
            Err(e) => return err(&req.id, "bad_params", format!("invalid entry: {}", e), None),
        },
        None => return err(&req.id, "bad_params", "missing entry", None),
    };
    match ledger::add_reading_log_entry(conn, &student_id, &input) {
        Ok(entry) => match to_value(req, &entry) {
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
    match ledger::list_reading_log(conn, &student_id) {
        Ok(entries) => match to_value(req, &entries) {
            Ok(v) => ok(&req.id, json!({ "studentId": student_id, "entries": v })),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

fn handle_summary(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match target_student(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ledger::reading_summary(conn, &student_id) {
        Ok(summary) => match to_value(req, &summary) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "readingLog.add" => Some(handle_add(state, req)),
        "readingLog.list" => Some(handle_list(state, req)),
        "readingLog.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}
