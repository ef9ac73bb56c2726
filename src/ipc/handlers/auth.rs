use crate::auth::{self, Role};
use crate::ipc::error::{err, from_error, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_raw_str, required_str, to_value};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use tracing::info;

fn parse_role(req: &Request, raw: Option<String>) -> Result<Option<Role>, Value> {
    match raw {
        None => Ok(None),
        Some(r) => Role::parse(&r)
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("unknown role: {}", r), None)),
    }
}

fn handle_users_register(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_raw_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match parse_role(req, optional_str(req, "role")) {
        Ok(r) => r.unwrap_or(Role::Student),
        Err(e) => return e,
    };
    match auth::register(conn, state.session.as_ref(), &name, password, role) {
        Ok(user) => match to_value(req, &user) {
            Ok(v) => ok(&req.id, json!({ "user": v })),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

fn handle_users_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    if let Err(e) = auth::require_teacher(state.session.as_ref()) {
        return from_error(&req.id, &e);
    }
    let role = match parse_role(req, optional_str(req, "role")) {
        Ok(r) => r,
        Err(e) => return e,
    };
    match auth::list_users(conn, role) {
        Ok(users) => match to_value(req, &users) {
            Ok(v) => ok(&req.id, json!({ "users": v })),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

fn handle_session_login(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_raw_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user = match auth::login(conn, &name, password) {
        Ok(u) => u,
        Err(e) => return from_error(&req.id, &e),
    };
    let value = match to_value(req, &user) {
        Ok(v) => v,
        Err(e) => return e,
    };
    state.session = Some(user);
    ok(&req.id, json!({ "user": value }))
}

fn handle_session_logout(state: &mut AppState, req: &Request) -> Value {
    if let Some(user) = state.session.take() {
        info!(user = %user.id, "signed out");
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_session_current(state: &mut AppState, req: &Request) -> Value {
    match auth::require_session(state.session.as_ref()) {
        Ok(user) => match to_value(req, user) {
            Ok(v) => ok(&req.id, json!({ "user": v })),
            Err(e) => e,
        },
        Err(e) => from_error(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "users.register" => Some(handle_users_register(state, req)),
        "users.list" => Some(handle_users_list(state, req)),
        "session.login" => Some(handle_session_login(state, req)),
        "session.logout" => Some(handle_session_logout(state, req)),
        "session.current" => Some(handle_session_current(state, req)),
        _ => None,
    }
}
