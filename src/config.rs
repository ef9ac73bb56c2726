//! Process configuration (environment) and workspace settings (the `setup.*`
//! JSON sections stored in the `settings` table).

use crate::db;
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "CLASSROOMD_WORKSPACE";
pub const ENV_LOG: &str = "CLASSROOMD_LOG";

#[derive(Debug, Clone, Default)]
pub struct DaemonConfig {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
    /// `EnvFilter` directives for stderr logging.
    pub log_filter: Option<String>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
            log_filter: non_empty(ENV_LOG).or_else(|| non_empty("RUST_LOG")),
        }
    }
}

pub const SETUP_PROGRESS: &str = "setup.progress";
pub const SETUP_CATALOG: &str = "setup.catalog";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSettings {
    pub count_orphans_in_raw: bool,
    pub recent_activity_limit: i64,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            count_orphans_in_raw: false,
            recent_activity_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub default_lesson_duration_minutes: i64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            default_lesson_duration_minutes: 75,
        }
    }
}

fn load_section(conn: &Connection, key: &str) -> Map<String, Value> {
    db::settings_get_json(conn, key)
        .ok()
        .flatten()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
}

impl ProgressSettings {
    pub fn load(conn: &Connection) -> Self {
        let obj = load_section(conn, SETUP_PROGRESS);
        let defaults = Self::default();
        Self {
            count_orphans_in_raw: obj
                .get("countOrphansInRaw")
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.count_orphans_in_raw),
            recent_activity_limit: obj
                .get("recentActivityLimit")
                .and_then(|v| v.as_i64())
                .filter(|v| (1..=50).contains(v))
                .unwrap_or(defaults.recent_activity_limit),
        }
    }
}

impl CatalogSettings {
    pub fn load(conn: &Connection) -> Self {
        let obj = load_section(conn, SETUP_CATALOG);
        Self {
            default_lesson_duration_minutes: obj
                .get("defaultLessonDurationMinutes")
                .and_then(|v| v.as_i64())
                .filter(|v| (1..=600).contains(v))
                .unwrap_or(Self::default().default_lesson_duration_minutes),
        }
    }
}
