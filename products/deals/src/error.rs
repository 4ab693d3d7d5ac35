use platform_db::{ConstraintKind, classify_constraint};
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error("rejected by {} constraint: {message}", kind.as_str())]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("attachment rejected: {0}")]
    Attachment(String),
    #[error("attachment storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode analysis: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Db(DbErr),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            StoreError::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match classify_constraint(&err) {
            Some(kind) => StoreError::Constraint {
                kind,
                message: err.to_string(),
            },
            None => StoreError::Db(err),
        }
    }
}
