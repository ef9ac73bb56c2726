use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::catalog::Catalog;
use crate::db;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Current catalog version, replaced wholesale on publish or import.
    pub catalog: Catalog,
    pub session: Option<CurrentUser>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            catalog: Catalog::empty(),
            session: None,
        }
    }

    /// Opens (or creates) the workspace database, loads its catalog and
    /// drops any session from the previous workspace.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        self.reopen_db(path)?;
        self.session = None;
        Ok(())
    }

    /// Reopens the database at `path` and reloads its catalog. The session is
    /// kept, so a caller that closed the connection can recover in place.
    pub fn reopen_db(&mut self, path: &Path) -> anyhow::Result<()> {
        self.db = None;
        let conn = db::open_db(path)
            .with_context(|| format!("failed to open workspace {}", path.to_string_lossy()))?;
        let catalog = Catalog::load(&conn).context("failed to load catalog")?;
        info!(
            workspace = %path.to_string_lossy(),
            catalog_version = catalog.version(),
            lessons = catalog.len(),
            "workspace opened"
        );
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        self.catalog = catalog;
        Ok(())
    }

    pub fn reload_catalog(&mut self) -> crate::error::Result<()> {
        if let Some(conn) = self.db.as_ref() {
            self.catalog = Catalog::load(conn)?;
        }
        Ok(())
    }
}
