mod auth;
mod backup;
mod catalog;
mod config;
mod curriculum;
mod db;
mod error;
mod ipc;
mod ledger;
mod reconcile;

use std::io::{self, BufRead, Write};

use config::DaemonConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(cfg: &DaemonConfig) {
    // stdout carries the protocol; logs go to stderr.
    let filter = cfg
        .log_filter
        .as_deref()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cfg = DaemonConfig::from_env();
    init_logging(&cfg);

    let mut state = ipc::AppState::new();
    if let Some(path) = cfg.workspace.as_ref() {
        if let Err(e) = state.open_workspace(path) {
            warn!(error = ?e, "could not open workspace from environment");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "classroomd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
