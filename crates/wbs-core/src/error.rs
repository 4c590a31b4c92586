use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Task {0} is a summary task; its schedule and progress are derived from its children")]
    SummaryReadOnly(Uuid),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Circular hierarchy: task '{0}' cannot be placed under '{1}'")]
    CycleDetected(String, String),

    #[error("Rollup walk from task {start} exceeded the maximum depth of {max_depth}")]
    PropagationDepthExceeded { start: Uuid, max_depth: usize },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Name)
}

/// Coarse classification used by hosts to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvariantViolation,
    Conflict,
    Storage,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::InvariantViolation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Storage => 500,
        }
    }
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Database(_) | CoreError::Migration(_) | CoreError::Io(_) => {
                ErrorKind::Storage
            }
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Validation { .. } | CoreError::AmbiguousId(_) => ErrorKind::Validation,
            CoreError::SummaryReadOnly(_)
            | CoreError::InvariantViolation(_)
            | CoreError::CycleDetected(_, _) => ErrorKind::InvariantViolation,
            CoreError::PropagationDepthExceeded { .. } => ErrorKind::Storage,
            CoreError::Conflict(_) => ErrorKind::Conflict,
        }
    }
}
