//! Versioned curriculum catalog.
//!
//! A `Catalog` is built once from the database when a workspace opens and is
//! never mutated afterwards. Publishing writes a new version and the caller
//! swaps in a freshly loaded value.

use crate::curriculum::{fold, parse_tag_list, Competency, Subject};
use crate::db;
use crate::error::{ClassroomError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LessonKey {
    pub subject: Subject,
    pub seq: i64,
}

impl LessonKey {
    pub fn new(subject: Subject, seq: i64) -> Self {
        Self { subject, seq }
    }
}

impl fmt::Display for LessonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.subject, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDefinition {
    pub subject: Subject,
    pub seq: i64,
    pub title: String,
    pub competencies: Vec<Competency>,
    pub duration_minutes: i64,
    pub objectives: String,
    pub materials: Vec<String>,
    pub content: String,
    pub month: Option<String>,
    pub week_number: Option<i64>,
    pub day_number: Option<i64>,
    pub tags: Vec<String>,
}

impl LessonDefinition {
    pub fn key(&self) -> LessonKey {
        LessonKey::new(self.subject, self.seq)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    pub subject: Option<Subject>,
    pub competency: Option<Competency>,
    pub month: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVersionInfo {
    pub version: i64,
    pub label: String,
    pub published_at: String,
    pub lesson_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    version: i64,
    lessons: Vec<LessonDefinition>,
    index: HashMap<LessonKey, usize>,
    known: HashSet<LessonKey>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a catalog from current lessons plus keys seen in older versions.
    pub fn from_parts(
        version: i64,
        mut lessons: Vec<LessonDefinition>,
        historical: impl IntoIterator<Item = LessonKey>,
    ) -> Self {
        lessons.sort_by_key(|l| l.key());
        let index = lessons
            .iter()
            .enumerate()
            .map(|(i, l)| (l.key(), i))
            .collect::<HashMap<_, _>>();
        let mut known: HashSet<LessonKey> = historical.into_iter().collect();
        known.extend(index.keys().copied());
        Self {
            version,
            lessons,
            index,
            known,
        }
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        let version: Option<i64> = conn
            .query_row("SELECT MAX(version) FROM catalog_versions", [], |r| r.get(0))
            .optional()?
            .flatten();
        let Some(version) = version else {
            return Ok(Self::empty());
        };

        let mut stmt = conn.prepare(
            "SELECT subject, seq, title, competencies_json, duration_minutes, objectives,
                    materials_json, content, month, week_number, day_number, tags_json
             FROM catalog_lessons
             WHERE version = ?
             ORDER BY subject, seq",
        )?;
        let rows = stmt
            .query_map([version], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, i64>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, Option<String>>(8)?,
                    r.get::<_, Option<i64>>(9)?,
                    r.get::<_, Option<i64>>(10)?,
                    r.get::<_, String>(11)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut lessons = Vec::with_capacity(rows.len());
        for (subject, seq, title, comps, duration, objectives, materials, content, month, week, day, tags) in rows {
            let Some(subject) = Subject::parse(&subject) else {
                tracing::warn!(subject = %subject, seq, "skipping catalog row with unknown subject");
                continue;
            };
            let competencies = serde_json::from_str::<Vec<String>>(&comps)?
                .iter()
                .filter_map(|t| Competency::parse_tag(t))
                .collect();
            lessons.push(LessonDefinition {
                subject,
                seq,
                title,
                competencies,
                duration_minutes: duration,
                objectives,
                materials: serde_json::from_str(&materials).unwrap_or_default(),
                content,
                month,
                week_number: week,
                day_number: day,
                tags: serde_json::from_str(&tags).unwrap_or_default(),
            });
        }

        let mut hist_stmt = conn.prepare("SELECT DISTINCT subject, seq FROM catalog_lessons")?;
        let historical = hist_stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(s, seq)| Subject::parse(&s).map(|s| LessonKey::new(s, seq)))
            .collect::<Vec<_>>();

        let catalog = Self::from_parts(version, lessons, historical);
        tracing::info!(
            version,
            lessons = catalog.lessons.len(),
            known = catalog.known.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn get_lesson(&self, key: LessonKey) -> Result<&LessonDefinition> {
        self.index
            .get(&key)
            .map(|&i| &self.lessons[i])
            .ok_or_else(|| ClassroomError::NotFound(format!("lesson {}", key)))
    }

    /// True when the key is part of the current version.
    pub fn contains(&self, key: LessonKey) -> bool {
        self.index.contains_key(&key)
    }

    /// True when the key exists in any published version.
    pub fn is_known(&self, key: LessonKey) -> bool {
        self.known.contains(&key)
    }

    pub fn lessons_for(&self, subject: Option<Subject>) -> impl Iterator<Item = &LessonDefinition> {
        self.lessons
            .iter()
            .filter(move |l| subject.map(|s| l.subject == s).unwrap_or(true))
    }

    pub fn list_lessons(&self, filter: &LessonFilter) -> Vec<&LessonDefinition> {
        let needle = filter.search.as_deref().map(fold).filter(|s| !s.is_empty());
        let month = filter.month.as_deref().map(fold).filter(|s| !s.is_empty());
        self.lessons_for(filter.subject)
            .filter(|l| {
                filter
                    .competency
                    .map(|c| l.competencies.contains(&c))
                    .unwrap_or(true)
            })
            .filter(|l| match &month {
                Some(m) => l.month.as_deref().map(fold).as_ref() == Some(m),
                None => true,
            })
            .filter(|l| match &needle {
                Some(n) => fold(&l.title).contains(n) || fold(&l.content).contains(n),
                None => true,
            })
            .collect()
    }

    /// Months in order of first appearance in the curriculum.
    pub fn months(&self, subject: Option<Subject>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for l in self.lessons_for(subject) {
            if let Some(m) = &l.month {
                if seen.insert(fold(m)) {
                    out.push(m.clone());
                }
            }
        }
        out
    }

    /// Lesson count per competency, every competency of the selected subjects included.
    pub fn competency_totals(&self, subject: Option<Subject>) -> Vec<(Competency, usize)> {
        Subject::selected(subject)
            .into_iter()
            .flat_map(|s| s.competencies().iter().copied())
            .map(|c| {
                let n = self
                    .lessons_for(Some(c.subject()))
                    .filter(|l| l.competencies.contains(&c))
                    .count();
                (c, n)
            })
            .collect()
    }

    pub fn export_csv(&self, out_path: &Path) -> anyhow::Result<usize> {
        use anyhow::Context;
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
        }
        let mut out = String::new();
        out.push_str(
            "subject,seq,month,week_number,day_number,title,duration_minutes,competencies,materials,objectives,tags,content\n",
        );
        for l in &self.lessons {
            let comps = l
                .competencies
                .iter()
                .map(|c| c.tag())
                .collect::<Vec<_>>()
                .join(",");
            let row = [
                l.subject.code().to_string(),
                l.seq.to_string(),
                l.month.clone().unwrap_or_default(),
                l.week_number.map(|v| v.to_string()).unwrap_or_default(),
                l.day_number.map(|v| v.to_string()).unwrap_or_default(),
                l.title.clone(),
                l.duration_minutes.to_string(),
                comps,
                l.materials.join("; "),
                l.objectives.clone(),
                l.tags.join(","),
                l.content.clone(),
            ];
            out.push_str(
                &row.iter()
                    .map(|s| csv_quote(s))
                    .collect::<Vec<_>>()
                    .join(","),
            );
            out.push('\n');
        }
        let mut f = std::fs::File::create(out_path)
            .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
        f.write_all(out.as_bytes())
            .context("failed to write catalog csv")?;
        Ok(self.lessons.len())
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Competency input accepted from seed files: either `["LIRE","ECRIRE"]` or `"Lecture, Écriture"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    List(Vec<String>),
    Text(String),
}

impl TagInput {
    fn joined(&self) -> String {
        match self {
            TagInput::List(v) => v.join(","),
            TagInput::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    pub subject: String,
    pub seq: i64,
    pub title: String,
    pub competencies: TagInput,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub objectives: Option<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub week_number: Option<i64>,
    #[serde(default)]
    pub day_number: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Validates a full catalog before publication. Errors name the offending lesson.
pub fn validate_drafts(
    drafts: Vec<LessonDraft>,
    default_duration: i64,
) -> Result<Vec<LessonDefinition>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(drafts.len());
    for (i, d) in drafts.into_iter().enumerate() {
        let at = format!("lessons[{}]", i);
        let subject = Subject::parse(&d.subject).ok_or_else(|| {
            ClassroomError::validation(format!("{}: unknown subject {:?}", at, d.subject))
        })?;
        if d.seq < 1 {
            return Err(ClassroomError::validation(format!(
                "{}: seq must be >= 1",
                at
            )));
        }
        let key = LessonKey::new(subject, d.seq);
        if !seen.insert(key) {
            return Err(ClassroomError::validation(format!(
                "{}: duplicate lesson {}",
                at, key
            )));
        }
        let title = d.title.trim().to_string();
        if title.is_empty() {
            return Err(ClassroomError::validation(format!(
                "{} ({}): title must not be empty",
                at, key
            )));
        }
        let competencies = parse_tag_list(subject, &d.competencies.joined()).map_err(|bad| {
            ClassroomError::validation(format!(
                "{} ({}): {:?} is not a {} competency",
                at,
                key,
                bad,
                subject.code()
            ))
        })?;
        if competencies.is_empty() {
            return Err(ClassroomError::validation(format!(
                "{} ({}): at least one competency is required",
                at, key
            )));
        }
        let duration_minutes = d.duration_minutes.unwrap_or(default_duration);
        if !(1..=600).contains(&duration_minutes) {
            return Err(ClassroomError::validation(format!(
                "{} ({}): durationMinutes must be in 1..=600",
                at, key
            )));
        }
        out.push(LessonDefinition {
            subject,
            seq: d.seq,
            title,
            competencies,
            duration_minutes,
            objectives: d.objectives.unwrap_or_default().trim().to_string(),
            materials: d
                .materials
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            content: d.content.unwrap_or_default(),
            month: trimmed(d.month),
            week_number: d.week_number,
            day_number: d.day_number,
            tags: d
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        });
    }
    Ok(out)
}

/// Writes `lessons` as the next catalog version in one transaction.
pub fn publish(
    conn: &mut Connection,
    label: &str,
    lessons: &[LessonDefinition],
) -> Result<CatalogVersionInfo> {
    let tx = conn.transaction().map_err(ClassroomError::DbTx)?;
    let version: i64 = tx.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM catalog_versions",
        [],
        |r| r.get(0),
    )?;
    let published_at = db::now_ts();
    let label = if label.trim().is_empty() {
        format!("v{}", version)
    } else {
        label.trim().to_string()
    };
    tx.execute(
        "INSERT INTO catalog_versions(version, label, published_at, lesson_count) VALUES(?, ?, ?, ?)",
        params![version, label, published_at, lessons.len() as i64],
    )
    .map_err(ClassroomError::DbInsert)?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO catalog_lessons(version, subject, seq, title, competencies_json, duration_minutes,
                objectives, materials_json, content, month, week_number, day_number, tags_json)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for l in lessons {
            let comps: Vec<&str> = l.competencies.iter().map(|c| c.tag()).collect();
            stmt.execute(params![
                version,
                l.subject.code(),
                l.seq,
                l.title,
                serde_json::to_string(&comps)?,
                l.duration_minutes,
                l.objectives,
                serde_json::to_string(&l.materials)?,
                l.content,
                l.month,
                l.week_number,
                l.day_number,
                serde_json::to_string(&l.tags)?,
            ])
            .map_err(ClassroomError::DbInsert)?;
        }
    }
    tx.commit().map_err(ClassroomError::DbCommit)?;
    tracing::info!(version, lessons = lessons.len(), "catalog version published");
    Ok(CatalogVersionInfo {
        version,
        label,
        published_at,
        lesson_count: lessons.len() as i64,
    })
}

pub fn list_versions(conn: &Connection) -> Result<Vec<CatalogVersionInfo>> {
    let mut stmt = conn.prepare(
        "SELECT version, label, published_at, lesson_count FROM catalog_versions ORDER BY version DESC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CatalogVersionInfo {
                version: r.get(0)?,
                label: r.get(1)?,
                published_at: r.get(2)?,
                lesson_count: r.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
