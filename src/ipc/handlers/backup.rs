use crate::auth;
use crate::backup;
use crate::ipc::error::{err, from_error, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_backup_export(state: &mut AppState, req: &Request) -> Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = auth::require_teacher(state.session.as_ref()) {
        return from_error(&req.id, &e);
    }
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => {
            info!(path = %out_path.to_string_lossy(), "workspace exported");
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "path": out_path.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "dbSha256": summary.db_sha256,
                }),
            )
        }
        Err(e) => {
            warn!(error = ?e, "workspace export failed");
            err(&req.id, "io_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = auth::require_teacher(state.session.as_ref()) {
        return from_error(&req.id, &e);
    }
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };

    // The database file is replaced underneath us; close it first.
    state.db = None;
    let summary = match backup::import_workspace_bundle(&in_path, &workspace) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = ?e, "workspace import failed");
            // Nothing was replaced: the caller stays signed in.
            if let Err(reopen) = state.reopen_db(&workspace) {
                warn!(error = ?reopen, "failed to reopen workspace after import");
            }
            return err(&req.id, "io_failed", format!("{e:#}"), None);
        }
    };
    if let Err(e) = state.open_workspace(&workspace) {
        return err(&req.id, "io_failed", format!("{e:#}"), None);
    }
    info!(format = %summary.bundle_format_detected, "workspace imported");
    ok(
        &req.id,
        json!({
            "ok": true,
            "bundleFormatDetected": summary.bundle_format_detected,
            "catalogVersion": state.catalog.version(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
