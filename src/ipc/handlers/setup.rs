use crate::config::{SETUP_CATALOG, SETUP_PROGRESS};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Progress,
    Catalog,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "progress" => Some(Self::Progress),
            "catalog" => Some(Self::Catalog),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Progress => SETUP_PROGRESS,
            Self::Catalog => SETUP_CATALOG,
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Progress => json!({
            "countOrphansInRaw": false,
            "recentActivityLimit": 5
        }),
        SetupSection::Catalog => json!({
            "defaultLessonDurationMinutes": 75
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Progress => match k.as_str() {
                "countOrphansInRaw" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "recentActivityLimit" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 50)?));
                }
                _ => return Err(format!("unknown progress field: {}", k)),
            },
            SetupSection::Catalog => match k.as_str() {
                "defaultLessonDurationMinutes" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 600)?));
                }
                _ => return Err(format!("unknown catalog field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let progress = match load_section(conn, SetupSection::Progress) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let catalog = match load_section(conn, SetupSection::Catalog) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "progress": progress, "catalog": catalog }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = crate::auth::require_teacher(state.session.as_ref()) {
        return crate::ipc::error::from_error(&req.id, &e);
    }
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true, "section": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
