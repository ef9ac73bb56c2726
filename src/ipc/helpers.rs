use rusqlite::Connection;
use serde_json::Value;

use crate::catalog::LessonKey;
use crate::curriculum::Subject;
use crate::error::ClassroomError;
use crate::ipc::error::{err, from_error};
use crate::ipc::types::{AppState, Request};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| from_error(&req.id, &ClassroomError::NoWorkspace))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Raw string parameter; no trimming, so passwords keep their spaces.
pub fn required_raw_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn optional_subject(req: &Request) -> Result<Option<Subject>, Value> {
    match optional_str(req, "subject") {
        None => Ok(None),
        Some(raw) => Subject::parse(&raw).map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("unknown subject: {}", raw),
                None,
            )
        }),
    }
}

/// `{ subject, seq }` with `seq >= 1`.
pub fn lesson_key(req: &Request) -> Result<LessonKey, Value> {
    let subject = optional_subject(req)?
        .ok_or_else(|| err(&req.id, "bad_params", "missing subject", None))?;
    let seq = req
        .params
        .get("seq")
        .and_then(|v| v.as_i64())
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "seq must be an integer >= 1",
                None,
            )
        })?;
    Ok(LessonKey::new(subject, seq))
}

pub fn to_value<T: serde::Serialize>(req: &Request, v: &T) -> Result<Value, Value> {
    serde_json::to_value(v).map_err(|e| err(&req.id, "bad_json", e.to_string(), None))
}

/// Student whose ledger the request targets (`params.studentId`), after
/// access checks against the signed-in user.
pub fn target_student(state: &AppState, req: &Request) -> Result<String, Value> {
    crate::auth::authorize_student_access(
        state.session.as_ref(),
        optional_str(req, "studentId").as_deref(),
    )
    .map_err(|e| from_error(&req.id, &e))
}
