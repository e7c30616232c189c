// ==========================================
// Scrap Recycling - Workflow Lock
// ==========================================
// One lock per database. Every mutating workflow command runs its
// check-then-write sequence while holding it, so StartBatch,
// CompleteBatch and the drobilka commands are linearized.
// ==========================================

use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::repository::error::RepositoryError;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct WorkflowLock {
    inner: Arc<Mutex<()>>,
}

impl WorkflowLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> WorkflowResult<MutexGuard<'_, ()>> {
        self.inner.lock().map_err(|e| {
            WorkflowError::Repository(RepositoryError::LockError(format!(
                "workflow lock poisoned: {}",
                e
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_one_lock() {
        let lock = WorkflowLock::new();
        let other = lock.clone();
        let _guard = lock.acquire().unwrap();
        assert!(other.inner.try_lock().is_err());
    }
}
