use crate::auth;
use crate::config::ProgressSettings;
use crate::ipc::error::{err, from_error, ok};
use crate::ipc::helpers::{db_conn, optional_subject, target_student, to_value};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::reconcile::{self, ReconcileOptions};
use rusqlite::Connection;
use serde_json::Value;

pub(super) fn reconcile_options(conn: &Connection) -> ReconcileOptions {
    ReconcileOptions {
        count_orphans_in_raw: ProgressSettings::load(conn).count_orphans_in_raw,
    }
}

fn handle_stats_student(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match target_student(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match optional_subject(req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    if let Err(e) = ledger::ensure_student_exists(conn, &student_id) {
        return from_error(&req.id, &e);
    }
    let entries = match ledger::list_for_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return from_error(&req.id, &e),
    };
    let stats = reconcile::compute_student_statistics(
        &state.catalog,
        &student_id,
        &entries,
        subject,
        reconcile_options(conn),
    );
    match to_value(req, &stats) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e,
    }
}

fn roster_ids(conn: &Connection, req: &Request) -> Result<Vec<String>, Value> {
    match req.params.get("studentIds") {
        None | Some(Value::Null) => {
            auth::active_student_ids(conn).map_err(|e| from_error(&req.id, &e))
        }
        Some(Value::Array(items)) => {
            let mut ids = Vec::with_capacity(items.len());
            for v in items {
                let Some(id) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        "studentIds must be an array of strings",
                        None,
                    ));
                };
                if !ids.iter().any(|x: &String| x == id) {
                    ids.push(id.to_string());
                }
            }
            Ok(ids)
        }
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            "studentIds must be an array of strings",
            None,
        )),
    }
}

fn handle_stats_class(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = auth::require_teacher(state.session.as_ref()) {
        return from_error(&req.id, &e);
    }
    let subject = match optional_subject(req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let ids = match roster_ids(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut roster = Vec::with_capacity(ids.len());
    for id in ids {
        let loaded = ledger::ensure_student_exists(conn, &id)
            .and_then(|_| ledger::list_for_student(conn, &id));
        match loaded {
            Ok(entries) => roster.push((id, entries)),
            Err(e) => return from_error(&req.id, &e),
        }
    }
    let stats = reconcile::compute_class_statistics(
        &state.catalog,
        &roster,
        subject,
        reconcile_options(conn),
    );
    match to_value(req, &stats) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "stats.student" => Some(handle_stats_student(state, req)),
        "stats.class" => Some(handle_stats_class(state, req)),
        _ => None,
    }
}

