use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use tracing::{debug, warn};

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::setup::try_handle,
    handlers::auth::try_handle,
    handlers::catalog::try_handle,
    handlers::progress::try_handle,
    handlers::reading_log::try_handle,
    handlers::stats::try_handle,
    handlers::dashboard::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    let resp = HANDLERS
        .iter()
        .find_map(|h| h(state, &req))
        .unwrap_or_else(|| {
            err(
                &req.id,
                "not_implemented",
                format!("unknown method: {}", req.method),
                None,
            )
        });
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = resp
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        warn!(id = %req.id, method = %req.method, code, "request failed");
    }
    resp
}
