//! Progress ledger: lesson completion rows and reading-log entries.

use crate::catalog::{Catalog, LessonKey};
use crate::curriculum::Subject;
use crate::db;
use crate::error::{ClassroomError, Result};
use crate::reconcile::round_off_1_decimal;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgressEntry {
    pub id: String,
    pub student_id: String,
    pub subject: Subject,
    pub seq: i64,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StudentProgressEntry {
    pub fn key(&self) -> LessonKey {
        LessonKey::new(self.subject, self.seq)
    }
}

const PROGRESS_COLUMNS: &str =
    "id, student_id, subject, seq, completed, completed_at, note, created_at, updated_at";

fn progress_from_row(r: &Row<'_>) -> rusqlite::Result<Option<StudentProgressEntry>> {
    let subject: String = r.get(2)?;
    let Some(subject) = Subject::parse(&subject) else {
        return Ok(None);
    };
    Ok(Some(StudentProgressEntry {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject,
        seq: r.get(3)?,
        completed: r.get::<_, i64>(4)? != 0,
        completed_at: r.get(5)?,
        note: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    }))
}

/// Ledgers belong to student accounts only; teacher ids are reported as unknown.
pub fn ensure_student_exists(conn: &Connection, student_id: &str) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM users WHERE id = ? AND role = 'student' LIMIT 1",
            [student_id],
            |_r| Ok(()),
        )
        .optional()?;
    match exists {
        Some(()) => Ok(()),
        None => Err(ClassroomError::NotFound(format!("student {}", student_id))),
    }
}

fn ensure_known(catalog: &Catalog, key: LessonKey) -> Result<()> {
    if catalog.is_known(key) {
        Ok(())
    } else {
        Err(ClassroomError::InvalidReference(key.to_string()))
    }
}

fn get_entry(conn: &Connection, student_id: &str, key: LessonKey) -> Result<Option<StudentProgressEntry>> {
    let sql = format!(
        "SELECT {} FROM student_progress WHERE student_id = ? AND subject = ? AND seq = ?",
        PROGRESS_COLUMNS
    );
    let entry = conn
        .query_row(&sql, params![student_id, key.subject.code(), key.seq], progress_from_row)
        .optional()?
        .flatten();
    Ok(entry)
}

fn fetch_entry(conn: &Connection, student_id: &str, key: LessonKey) -> Result<StudentProgressEntry> {
    get_entry(conn, student_id, key)?
        .ok_or_else(|| ClassroomError::NotFound(format!("progress {} for {}", key, student_id)))
}

/// Idempotent: one row per (student, lesson); repeated calls refresh the timestamp.
pub fn mark_complete(
    conn: &Connection,
    catalog: &Catalog,
    student_id: &str,
    key: LessonKey,
) -> Result<StudentProgressEntry> {
    ensure_known(catalog, key)?;
    ensure_student_exists(conn, student_id)?;
    let now = db::now_ts();
    conn.execute(
        "INSERT INTO student_progress(id, student_id, subject, seq, completed, completed_at, note, created_at, updated_at)
         VALUES(?, ?, ?, ?, 1, ?, NULL, ?, ?)
         ON CONFLICT(student_id, subject, seq) DO UPDATE SET
            completed = 1,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            student_id,
            key.subject.code(),
            key.seq,
            now,
            now,
            now
        ],
    )
    .map_err(ClassroomError::DbUpdate)?;
    tracing::debug!(student = student_id, lesson = %key, "lesson marked complete");
    fetch_entry(conn, student_id, key)
}

/// Clears the flag but keeps the row; creates it on first interaction.
pub fn mark_incomplete(
    conn: &Connection,
    catalog: &Catalog,
    student_id: &str,
    key: LessonKey,
) -> Result<StudentProgressEntry> {
    ensure_known(catalog, key)?;
    ensure_student_exists(conn, student_id)?;
    let now = db::now_ts();
    conn.execute(
        "INSERT INTO student_progress(id, student_id, subject, seq, completed, completed_at, note, created_at, updated_at)
         VALUES(?, ?, ?, ?, 0, NULL, NULL, ?, ?)
         ON CONFLICT(student_id, subject, seq) DO UPDATE SET
            completed = 0,
            completed_at = NULL,
            updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            student_id,
            key.subject.code(),
            key.seq,
            now,
            now
        ],
    )
    .map_err(ClassroomError::DbUpdate)?;
    tracing::debug!(student = student_id, lesson = %key, "lesson marked incomplete");
    fetch_entry(conn, student_id, key)
}

/// Sets or clears (empty / `None`) the free-text note on a progress row.
pub fn set_note(
    conn: &Connection,
    catalog: &Catalog,
    student_id: &str,
    key: LessonKey,
    note: Option<&str>,
) -> Result<StudentProgressEntry> {
    ensure_known(catalog, key)?;
    ensure_student_exists(conn, student_id)?;
    let note = note.map(str::trim).filter(|s| !s.is_empty());
    let now = db::now_ts();
    conn.execute(
        "INSERT INTO student_progress(id, student_id, subject, seq, completed, completed_at, note, created_at, updated_at)
         VALUES(?, ?, ?, ?, 0, NULL, ?, ?, ?)
         ON CONFLICT(student_id, subject, seq) DO UPDATE SET
            note = excluded.note,
            updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            student_id,
            key.subject.code(),
            key.seq,
            note,
            now,
            now
        ],
    )
    .map_err(ClassroomError::DbUpdate)?;
    fetch_entry(conn, student_id, key)
}

pub fn list_for_student(conn: &Connection, student_id: &str) -> Result<Vec<StudentProgressEntry>> {
    let sql = format!(
        "SELECT {} FROM student_progress WHERE student_id = ? ORDER BY subject, seq",
        PROGRESS_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map([student_id], progress_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    rows.sort_by_key(|e| e.key());
    Ok(rows)
}

/// Completed rows, most recent completion first.
pub fn recent_completions(
    conn: &Connection,
    student_id: &str,
    subject: Option<Subject>,
    limit: usize,
) -> Result<Vec<StudentProgressEntry>> {
    let mut rows: Vec<StudentProgressEntry> = list_for_student(conn, student_id)?
        .into_iter()
        .filter(|e| e.completed)
        .filter(|e| subject.map(|s| e.subject == s).unwrap_or(true))
        .collect();
    rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.key().cmp(&a.key())));
    rows.truncate(limit);
    Ok(rows)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingLogInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub pages_read: Option<i64>,
    #[serde(default)]
    pub total_pages: Option<i64>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub evaluation: Option<String>,
    #[serde(default)]
    pub reflection: Option<String>,
    #[serde(default)]
    pub reading_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingLogEntry {
    pub id: i64,
    pub student_id: String,
    pub title: String,
    pub author: String,
    pub pages_read: i64,
    pub total_pages: Option<i64>,
    pub rating: Option<i64>,
    pub evaluation: Option<String>,
    pub reflection: String,
    pub reading_date: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSummary {
    pub books_logged: i64,
    pub total_pages_read: i64,
    pub average_rating: Option<f64>,
}

fn validate_reading_input(input: &ReadingLogInput) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(ClassroomError::validation("title must not be empty"));
    }
    if input.author.trim().is_empty() {
        return Err(ClassroomError::validation("author must not be empty"));
    }
    if let Some(r) = input.rating {
        if !(1..=5).contains(&r) {
            return Err(ClassroomError::validation("rating must be in 1..=5"));
        }
    }
    if input.pages_read.unwrap_or(0) < 0 {
        return Err(ClassroomError::validation("pagesRead must be >= 0"));
    }
    if let Some(t) = input.total_pages {
        if t <= 0 {
            return Err(ClassroomError::validation("totalPages must be > 0"));
        }
    }
    if let Some(d) = input.reading_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() {
            return Err(ClassroomError::validation("readingDate must be YYYY-MM-DD"));
        }
    }
    Ok(())
}

const READING_COLUMNS: &str = "id, student_id, book_title, author, pages_read, total_pages, rating, evaluation, reflection, reading_date, created_at";

fn reading_from_row(r: &Row<'_>) -> rusqlite::Result<ReadingLogEntry> {
    Ok(ReadingLogEntry {
        id: r.get(0)?,
        student_id: r.get(1)?,
        title: r.get(2)?,
        author: r.get(3)?,
        pages_read: r.get(4)?,
        total_pages: r.get(5)?,
        rating: r.get(6)?,
        evaluation: r.get(7)?,
        reflection: r.get(8)?,
        reading_date: r.get(9)?,
        created_at: r.get(10)?,
    })
}

pub fn add_reading_log_entry(
    conn: &Connection,
    student_id: &str,
    input: &ReadingLogInput,
) -> Result<ReadingLogEntry> {
    validate_reading_input(input)?;
    ensure_student_exists(conn, student_id)?;
    let optional = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    conn.execute(
        "INSERT INTO reading_log(student_id, book_title, author, pages_read, total_pages, rating, evaluation, reflection, reading_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            student_id,
            input.title.trim(),
            input.author.trim(),
            input.pages_read.unwrap_or(0),
            input.total_pages,
            input.rating,
            optional(&input.evaluation),
            input.reflection.as_deref().unwrap_or("").trim(),
            optional(&input.reading_date),
            db::now_ts(),
        ],
    )
    .map_err(ClassroomError::DbInsert)?;
    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {} FROM reading_log WHERE id = ?", READING_COLUMNS);
    let entry = conn.query_row(&sql, [id], reading_from_row)?;
    tracing::debug!(student = student_id, id, "reading log entry added");
    Ok(entry)
}

/// Most recent first.
pub fn list_reading_log(conn: &Connection, student_id: &str) -> Result<Vec<ReadingLogEntry>> {
    let sql = format!(
        "SELECT {} FROM reading_log WHERE student_id = ? ORDER BY created_at DESC, id DESC",
        READING_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], reading_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn reading_summary(conn: &Connection, student_id: &str) -> Result<ReadingSummary> {
    let (books_logged, total_pages_read, avg): (i64, i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(pages_read), 0), AVG(rating) FROM reading_log WHERE student_id = ?",
        [student_id],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    Ok(ReadingSummary {
        books_logged,
        total_pages_read,
        average_rating: avg.map(round_off_1_decimal),
    })
}
