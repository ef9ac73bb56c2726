use crate::auth;
use crate::catalog::{self, LessonDraft, LessonFilter};
use crate::config::CatalogSettings;
use crate::curriculum::{Competency, Subject, ALL_SUBJECTS};
use crate::ipc::error::{err, from_error, ok};
use crate::ipc::helpers::{db_conn, lesson_key, optional_str, optional_subject, required_str, to_value};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::path::PathBuf;

fn parse_competency(subject: Option<Subject>, raw: &str) -> Option<Competency> {
    if let Some(c) = Competency::parse_tag(&raw.trim().to_ascii_uppercase()) {
        if subject.map(|s| s == c.subject()).unwrap_or(true) {
            return Some(c);
        }
        return None;
    }
    Subject::selected(subject)
        .into_iter()
        .find_map(|s| Competency::parse_for(s, raw))
}

fn handle_catalog_versions(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match catalog::list_versions(conn) {
        Ok(versions) => match to_value(req, &versions) {
            Ok(v) => ok(
                &req.id,
                json!({ "currentVersion": state.catalog.version(), "versions": v }),
            ),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

fn handle_catalog_publish(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    if let Err(e) = auth::require_teacher(state.session.as_ref()) {
        return from_error(&req.id, &e);
    }
    let Some(raw_lessons) = req.params.get("lessons").cloned() else {
        return err(&req.id, "bad_params", "missing lessons", None);
    };
    let drafts: Vec<LessonDraft> = match serde_json::from_value(raw_lessons) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid lessons: {}", e), None),
    };
    let label = optional_str(req, "label").unwrap_or_default();

    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let settings = CatalogSettings::load(conn);
    let lessons = match catalog::validate_drafts(drafts, settings.default_lesson_duration_minutes) {
        Ok(v) => v,
        Err(e) => return from_error(&req.id, &e),
    };
    let info = match catalog::publish(conn, &label, &lessons) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if let Err(e) = state.reload_catalog() {
        return from_error(&req.id, &e);
    }
    match to_value(req, &info) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e,
    }
}

fn handle_catalog_list(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    let subject = match optional_subject(req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let competency = match optional_str(req, "competency") {
        None => None,
        Some(raw) => match parse_competency(subject, &raw) {
            Some(c) => Some(c),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown competency: {}", raw),
                    None,
                )
            }
        },
    };
    let filter = LessonFilter {
        subject,
        competency,
        month: optional_str(req, "month"),
        search: optional_str(req, "search"),
    };
    let lessons = state.catalog.list_lessons(&filter);
    match to_value(req, &lessons) {
        Ok(v) => ok(
            &req.id,
            json!({ "version": state.catalog.version(), "lessons": v }),
        ),
        Err(e) => e,
    }
}

fn handle_catalog_open(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    let key = match lesson_key(req) {
        Ok(k) => k,
        Err(e) => return e,
    };
    match state.catalog.get_lesson(key) {
        Ok(lesson) => match to_value(req, lesson) {
            Ok(v) => ok(&req.id, json!({ "lesson": v })),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

fn handle_catalog_months(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    let subject = match optional_subject(req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "months": state.catalog.months(subject) }))
}

fn handle_catalog_competencies(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    let subject = match optional_subject(req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let rows: Vec<Value> = state
        .catalog
        .competency_totals(subject)
        .into_iter()
        .map(|(c, n)| {
            json!({
                "subject": c.subject(),
                "competency": c,
                "label": c.label(),
                "lessonCount": n,
            })
        })
        .collect();
    let subjects: Vec<Value> = ALL_SUBJECTS
        .iter()
        .filter(|s| subject.map(|f| f == **s).unwrap_or(true))
        .map(|s| json!({ "subject": s, "label": s.label() }))
        .collect();
    ok(&req.id, json!({ "subjects": subjects, "competencies": rows }))
}

fn handle_catalog_export_csv(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    let out_path = match required_str(req, "outPath") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e,
    };
    match state.catalog.export_csv(&out_path) {
        Ok(rows) => ok(
            &req.id,
            json!({ "rowsExported": rows, "path": out_path.to_string_lossy() }),
        ),
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "catalog.versions" => Some(handle_catalog_versions(state, req)),
        "catalog.publish" => Some(handle_catalog_publish(state, req)),
        "catalog.list" => Some(handle_catalog_list(state, req)),
        "catalog.open" => Some(handle_catalog_open(state, req)),
        "catalog.months" => Some(handle_catalog_months(state, req)),
        "catalog.competencies" => Some(handle_catalog_competencies(state, req)),
        "catalog.exportCsv" => Some(handle_catalog_export_csv(state, req)),
        _ => None,
    }
}
