//! Accounts, sign-in and the access rules applied to ledger reads and writes.

use crate::curriculum::fold;
use crate::db;
use crate::error::{ClassroomError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const MAX_NAME_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "teacher" | "enseignant" | "enseignante" => Some(Role::Teacher),
            "student" | "eleve" => Some(Role::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Hashes a password into a PHC string (algorithm, parameters and salt included).
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ClassroomError::validation(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn user_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
}

/// Creates an account. The first account of a workspace bootstraps it and may
/// take any role; teacher accounts after that need a signed-in teacher.
pub fn register(
    conn: &Connection,
    actor: Option<&CurrentUser>,
    name: &str,
    password: &str,
    role: Role,
) -> Result<CurrentUser> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClassroomError::validation("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ClassroomError::validation(format!(
            "name length must be <= {}",
            MAX_NAME_LEN
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClassroomError::validation(format!(
            "password must have at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if role == Role::Teacher
        && user_count(conn)? > 0
        && !actor.map(CurrentUser::is_teacher).unwrap_or(false)
    {
        return Err(ClassroomError::unauthorized(
            "only a teacher can create teacher accounts",
        ));
    }

    let name_key = fold(name);
    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM users WHERE name_key = ?",
            [&name_key],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(ClassroomError::Conflict(format!(
            "user name already taken: {}",
            name
        )));
    }

    let id = Uuid::new_v4().to_string();
    let digest = hash_password(password)?;
    conn.execute(
        "INSERT INTO users(id, name, name_key, role, password_salt, password_digest, active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 1, ?)",
        params![
            id,
            name,
            name_key,
            role.as_str(),
            "",
            digest,
            db::now_ts()
        ],
    )
    .map_err(ClassroomError::DbInsert)?;
    info!(user = %id, role = role.as_str(), "registered user");
    Ok(CurrentUser {
        id,
        name: name.to_string(),
        role,
    })
}

pub fn login(conn: &Connection, name: &str, password: &str) -> Result<CurrentUser> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT id, name, role, password_digest
             FROM users WHERE name_key = ? AND active = 1",
            [fold(name)],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((id, display, role_raw, digest)) = row else {
        return Err(ClassroomError::Unauthenticated);
    };
    if !verify_password(password, &digest) {
        return Err(ClassroomError::Unauthenticated);
    }
    let role = Role::parse(&role_raw).unwrap_or(Role::Student);
    conn.execute(
        "UPDATE users SET last_login = ? WHERE id = ?",
        params![db::now_ts(), id],
    )
    .map_err(ClassroomError::DbUpdate)?;
    info!(user = %id, "signed in");
    Ok(CurrentUser {
        id,
        name: display,
        role,
    })
}

pub fn list_users(conn: &Connection, role: Option<Role>) -> Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, role, active, created_at, last_login
         FROM users
         WHERE (?1 IS NULL OR role = ?1)
         ORDER BY name_key",
    )?;
    let rows = stmt
        .query_map([role.map(Role::as_str)], |r| {
            let role_raw: String = r.get(2)?;
            Ok(UserSummary {
                id: r.get(0)?,
                name: r.get(1)?,
                role: Role::parse(&role_raw).unwrap_or(Role::Student),
                active: r.get::<_, i64>(3)? != 0,
                created_at: r.get(4)?,
                last_login: r.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Ids of active students, in name order. Default class roster.
pub fn active_student_ids(conn: &Connection) -> Result<Vec<String>> {
    Ok(list_users(conn, Some(Role::Student))?
        .into_iter()
        .filter(|u| u.active)
        .map(|u| u.id)
        .collect())
}

pub fn require_session(session: Option<&CurrentUser>) -> Result<&CurrentUser> {
    session.ok_or(ClassroomError::Unauthenticated)
}

pub fn require_teacher(session: Option<&CurrentUser>) -> Result<&CurrentUser> {
    let user = require_session(session)?;
    if !user.is_teacher() {
        return Err(ClassroomError::unauthorized("teacher role required"));
    }
    Ok(user)
}

/// Resolves whose ledger a request targets. Students are pinned to their own;
/// teachers must name a student.
pub fn authorize_student_access(
    session: Option<&CurrentUser>,
    requested: Option<&str>,
) -> Result<String> {
    let user = require_session(session)?;
    match (user.role, requested) {
        (Role::Student, None) => Ok(user.id.clone()),
        (Role::Student, Some(id)) if id == user.id => Ok(user.id.clone()),
        (Role::Student, Some(_)) => Err(ClassroomError::unauthorized(
            "students can only access their own progress",
        )),
        (Role::Teacher, Some(id)) => Ok(id.to_string()),
        (Role::Teacher, None) => Err(ClassroomError::validation("missing studentId")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = db::open_db(dir.path()).expect("open");
        (dir, conn)
    }

    #[test]
    fn first_account_bootstraps_teacher() {
        let (_dir, conn) = open();
        let t = register(&conn, None, "Mme Roy", "secret1", Role::Teacher).expect("teacher");
        assert!(t.is_teacher());

        let err = register(&conn, None, "Other", "secret1", Role::Teacher).unwrap_err();
        assert_eq!(err.code(), "unauthorized");

        let t2 = register(&conn, Some(&t), "Other", "secret1", Role::Teacher).expect("teacher 2");
        assert_eq!(t2.role, Role::Teacher);
    }

    #[test]
    fn names_are_unique_ignoring_case_and_accents() {
        let (_dir, conn) = open();
        register(&conn, None, "Élodie", "secret1", Role::Student).expect("first");
        let err = register(&conn, None, "elodie", "secret1", Role::Student).unwrap_err();
        assert_eq!(err.code(), "conflict");
        let short = register(&conn, None, "Zoé", "abc", Role::Student).unwrap_err();
        assert_eq!(short.code(), "validation_error");
    }

    #[test]
    fn login_verifies_password() {
        let (_dir, conn) = open();
        let u = register(&conn, None, "Léa", "hunter22", Role::Student).expect("register");
        let again = login(&conn, "LÉA", "hunter22").expect("login");
        assert_eq!(again, u);
        assert_eq!(login(&conn, "Léa", "wrong!!").unwrap_err().code(), "unauthenticated");
        assert_eq!(login(&conn, "nobody", "hunter22").unwrap_err().code(), "unauthenticated");

        let last: Option<String> = conn
            .query_row("SELECT last_login FROM users WHERE id = ?", [&u.id], |r| r.get(0))
            .expect("row");
        assert!(last.is_some());
    }

    #[test]
    fn passwords_are_stored_as_argon2_phc_strings() {
        let (_dir, conn) = open();
        let a = register(&conn, None, "Anna", "secret1", Role::Student).expect("a");
        let b = register(&conn, None, "Ben", "secret1", Role::Student).expect("b");
        let stored = |id: &str| -> String {
            conn.query_row("SELECT password_digest FROM users WHERE id = ?", [id], |r| {
                r.get(0)
            })
            .expect("digest")
        };
        let (da, db_) = (stored(&a.id), stored(&b.id));
        assert!(da.starts_with("$argon2"));
        assert!(!da.contains("secret1"));
        // Same password, fresh salt each time.
        assert_ne!(da, db_);
        assert!(verify_password("secret1", &da));
        assert!(!verify_password("secret2", &da));
    }

    #[test]
    fn malformed_stored_digest_never_signs_in() {
        let (_dir, conn) = open();
        let u = register(&conn, None, "Léa", "hunter22", Role::Student).expect("register");
        conn.execute(
            "UPDATE users SET password_digest = 'not-a-phc-string' WHERE id = ?",
            [&u.id],
        )
        .expect("corrupt");
        assert_eq!(login(&conn, "Léa", "hunter22").unwrap_err().code(), "unauthenticated");
    }

    #[test]
    fn student_access_is_pinned_to_self() {
        let student = CurrentUser {
            id: "s1".into(),
            name: "S".into(),
            role: Role::Student,
        };
        let teacher = CurrentUser {
            id: "t1".into(),
            name: "T".into(),
            role: Role::Teacher,
        };
        assert_eq!(authorize_student_access(Some(&student), None).unwrap(), "s1");
        assert_eq!(authorize_student_access(Some(&student), Some("s1")).unwrap(), "s1");
        assert_eq!(
            authorize_student_access(Some(&student), Some("s2")).unwrap_err().code(),
            "unauthorized"
        );
        assert_eq!(authorize_student_access(Some(&teacher), Some("s2")).unwrap(), "s2");
        assert_eq!(
            authorize_student_access(None, Some("s2")).unwrap_err().code(),
            "unauthenticated"
        );
        assert!(require_teacher(Some(&student)).is_err());
    }

    #[test]
    fn roster_lists_active_students_only() {
        let (_dir, conn) = open();
        register(&conn, None, "Prof", "secret1", Role::Teacher).expect("t");
        let a = register(&conn, None, "Anna", "secret1", Role::Student).expect("a");
        let b = register(&conn, None, "Ben", "secret1", Role::Student).expect("b");
        conn.execute("UPDATE users SET active = 0 WHERE id = ?", [&b.id])
            .expect("deactivate");
        assert_eq!(active_student_ids(&conn).expect("roster"), vec![a.id]);
        assert_eq!(list_users(&conn, None).expect("all").len(), 3);
    }
}
