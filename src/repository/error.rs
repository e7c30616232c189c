// ==========================================
// Scrap Recycling - Repository Errors
// ==========================================
// Tool: thiserror derive
// ==========================================

use thiserror::Error;

/// Repository layer error
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== concurrency =====
    #[error("concurrent modification: {message}")]
    ConcurrentModification { message: String },

    // ===== database =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("database lock acquisition failed: {0}")]
    LockError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("database query failed: {0}")]
    DatabaseQueryError(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    // ===== data quality =====
    #[error("invalid value in column {field}: {message}")]
    FieldValueError { field: String, message: String },

    #[error("serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    /// True when the violated UNIQUE constraint is the single-active-batch index
    pub fn is_active_batch_violation(&self) -> bool {
        match self {
            RepositoryError::UniqueConstraintViolation(msg) => {
                msg.contains("recycling_batch.status")
                    || msg.contains(crate::db::ACTIVE_BATCH_INDEX)
            }
            _ => false,
        }
    }

    /// True when two starts raced for the same sequential batch number
    pub fn is_batch_number_violation(&self) -> bool {
        matches!(
            self,
            RepositoryError::UniqueConstraintViolation(msg) if msg.contains("recycling_batch.batch_number")
        )
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result alias
pub type RepositoryResult<T> = Result<T, RepositoryError>;
