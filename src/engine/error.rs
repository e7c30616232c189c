// ==========================================
// Scrap Recycling - Workflow Errors
// ==========================================
// State-machine violations are terminal for the attempt that raised them;
// the message always names the precondition that failed.
// ==========================================

use crate::domain::types::DrobilkaType;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Single-active-instance invariant violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Entity is in the wrong lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// CompletionGate refused the batch
    #[error("precondition failed for batch {batch_label}: {}", describe_missing(.missing))]
    PreconditionFailed {
        batch_id: String,
        batch_label: String,
        missing: Vec<DrobilkaType>,
    },

    #[error("{entity} not found: id={id}")]
    NotFound { entity: String, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        WorkflowError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

fn describe_missing(missing: &[DrobilkaType]) -> String {
    missing
        .iter()
        .map(|t| format!("{} has no completed drobilka run", t.line_name()))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
