// ==========================================
// Scrap Recycling - API Errors
// ==========================================
// Turns engine/repository errors into operator-facing messages.
// Every rejected command names the precondition that failed.
// ==========================================

use crate::domain::types::DrobilkaType;
use crate::engine::error::WorkflowError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // Workflow refusals (terminal for the attempt)
    // ==========================================
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    /// Gate refused completion; `missing` lists lines without a completed run
    #[error("{message}")]
    PreconditionFailed {
        message: String,
        missing: Vec<DrobilkaType>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ==========================================
    // Infrastructure
    // ==========================================
    /// System of record unreachable; safe to retry
    #[error("system of record unreachable: {0}")]
    TransientIo(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    /// Stable machine code for UIs and HTTP adapters
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::TransientIo(_) => "TRANSIENT_IO",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Only transient IO may be retried automatically
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::TransientIo(_))
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// Serializable error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

// ==========================================
// From WorkflowError
// ==========================================
impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::Conflict(msg) => ApiError::Conflict(msg),
            WorkflowError::InvalidState(msg) => ApiError::InvalidState(msg),
            WorkflowError::PreconditionFailed { missing, .. } => {
                ApiError::PreconditionFailed { message, missing }
            }
            WorkflowError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            WorkflowError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            WorkflowError::Repository(e) => ApiError::from(e),
        }
    }
}

// ==========================================
// From RepositoryError
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ConcurrentModification { message } => ApiError::Conflict(message),
            e @ RepositoryError::UniqueConstraintViolation(_) if e.is_active_batch_violation() => {
                ApiError::Conflict("a recycling batch is already in progress".to_string())
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::TransientIo(msg),
            RepositoryError::DatabaseQueryError(msg) if is_busy_message(&msg) => {
                ApiError::TransientIo(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::InternalError(format!("connection lock failed: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("unique constraint violated: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("referenced entity does not exist: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("bad value in {}: {}", field, message))
            }
            RepositoryError::SerializationError(e) => ApiError::InternalError(e.to_string()),
            RepositoryError::Other(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

fn is_busy_message(msg: &str) -> bool {
    msg.contains("database is locked") || msg.contains("database is busy")
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_keeps_missing_lines_and_message() {
        let err: ApiError = WorkflowError::PreconditionFailed {
            batch_id: "B1".to_string(),
            batch_label: "RB-000003".to_string(),
            missing: vec![DrobilkaType::Hard],
        }
        .into();

        assert_eq!(err.code(), "PRECONDITION_FAILED");
        assert!(err.to_string().contains("hard line has no completed drobilka run"));
        match err {
            ApiError::PreconditionFailed { missing, .. } => {
                assert_eq!(missing, vec![DrobilkaType::Hard])
            }
            other => panic!("Expected PreconditionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_active_batch_index_hit_is_conflict() {
        let repo_err = RepositoryError::UniqueConstraintViolation(
            "UNIQUE constraint failed: recycling_batch.status".to_string(),
        );
        let api_err: ApiError = WorkflowError::from(repo_err).into();
        assert_eq!(api_err.code(), "CONFLICT");
        assert!(!api_err.is_retryable());
    }

    #[test]
    fn test_connection_failure_is_retryable() {
        let api_err: ApiError =
            RepositoryError::DatabaseConnectionError("unable to open".to_string()).into();
        assert_eq!(api_err.code(), "TRANSIENT_IO");
        assert!(api_err.is_retryable());

        let api_err: ApiError =
            RepositoryError::DatabaseQueryError("database is locked".to_string()).into();
        assert!(api_err.is_retryable());
    }

    #[test]
    fn test_refusals_are_not_retryable() {
        let errs = vec![
            ApiError::from(WorkflowError::Conflict("x".to_string())),
            ApiError::from(WorkflowError::InvalidState("x".to_string())),
            ApiError::from(WorkflowError::not_found("RecyclingBatch", "B9")),
        ];
        for err in errs {
            assert!(!err.is_retryable(), "{} must not be retryable", err.code());
        }
    }

    #[test]
    fn test_payload_carries_code_and_message() {
        let payload = ApiError::from(WorkflowError::not_found("DrobilkaProcess", "P1")).to_payload();
        assert_eq!(payload.code, "NOT_FOUND");
        assert!(payload.message.contains("P1"));
        assert!(!payload.retryable);
    }
}
