use thiserror::Error;

/// Domain errors surfaced to the IPC boundary. None of these are fatal to the
/// process; the router turns each one into an `{ ok: false }` response.
#[derive(Error, Debug)]
pub enum ClassroomError {
    #[error("select a workspace first")]
    NoWorkspace,

    #[error("{0} not found")]
    NotFound(String),

    #[error("unknown lesson {0}")]
    InvalidReference(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("sign in first")]
    Unauthenticated,

    #[error("{0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("database insert failed: {0}")]
    DbInsert(rusqlite::Error),

    #[error("database update failed: {0}")]
    DbUpdate(rusqlite::Error),

    #[error("database transaction failed: {0}")]
    DbTx(rusqlite::Error),

    #[error("database commit failed: {0}")]
    DbCommit(rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClassroomError {
    pub fn code(&self) -> &'static str {
        match self {
            ClassroomError::NoWorkspace => "no_workspace",
            ClassroomError::NotFound(_) => "not_found",
            ClassroomError::InvalidReference(_) => "invalid_reference",
            ClassroomError::Validation(_) => "validation_error",
            ClassroomError::Conflict(_) => "conflict",
            ClassroomError::Unauthenticated => "unauthenticated",
            ClassroomError::Unauthorized(_) => "unauthorized",
            ClassroomError::Db(_) => "db_query_failed",
            ClassroomError::DbInsert(_) => "db_insert_failed",
            ClassroomError::DbUpdate(_) => "db_update_failed",
            ClassroomError::DbTx(_) => "db_tx_failed",
            ClassroomError::DbCommit(_) => "db_commit_failed",
            ClassroomError::Io(_) => "io_failed",
            ClassroomError::Json(_) => "bad_json",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClassroomError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ClassroomError::Unauthorized(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ClassroomError>;
