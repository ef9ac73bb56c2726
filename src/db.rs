use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "classroom.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            password_digest TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            last_login TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalog_versions(
            version INTEGER PRIMARY KEY,
            label TEXT NOT NULL,
            published_at TEXT NOT NULL,
            lesson_count INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalog_lessons(
            version INTEGER NOT NULL,
            subject TEXT NOT NULL,
            seq INTEGER NOT NULL,
            title TEXT NOT NULL,
            competencies_json TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            objectives TEXT NOT NULL DEFAULT '',
            materials_json TEXT NOT NULL DEFAULT '[]',
            content TEXT NOT NULL DEFAULT '',
            month TEXT,
            week_number INTEGER,
            day_number INTEGER,
            tags_json TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY(version, subject, seq),
            FOREIGN KEY(version) REFERENCES catalog_versions(version)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalog_lessons_key ON catalog_lessons(subject, seq)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_progress(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            seq INTEGER NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id),
            UNIQUE(student_id, subject, seq)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_progress_student ON student_progress(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reading_log(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL,
            book_title TEXT NOT NULL,
            author TEXT NOT NULL,
            pages_read INTEGER NOT NULL DEFAULT 0,
            total_pages INTEGER,
            rating INTEGER CHECK(rating IS NULL OR (rating >= 1 AND rating <= 5)),
            reflection TEXT NOT NULL DEFAULT '',
            reading_date TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id)
        )",
        [],
    )?;
    // Workspaces created before evaluations were tracked lack this column.
    ensure_reading_log_evaluation(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reading_log_student ON reading_log(student_id, created_at)",
        [],
    )?;

    Ok(conn)
}

fn ensure_reading_log_evaluation(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "reading_log", "evaluation")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE reading_log ADD COLUMN evaluation TEXT", [])?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// UTC timestamp with a fixed width so text ordering matches time ordering.
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
