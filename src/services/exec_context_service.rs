use std::sync::Arc;
use tracing::{debug, info};

use crate::database::EntityStore;
use crate::error::DispatcherResult;
use crate::sync::LockRegistries;

use super::ExecContextCache;

/// Lifecycle operations on an execution context that must hold its write lock.
///
/// Used both by explicit deletion requests and by the reclamation sweep.
#[derive(Clone)]
pub struct ExecContextService {
    store: Arc<dyn EntityStore>,
    locks: Arc<LockRegistries>,
    cache: Arc<ExecContextCache>,
}

impl std::fmt::Debug for ExecContextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContextService")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl ExecContextService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        locks: Arc<LockRegistries>,
        cache: Arc<ExecContextCache>,
    ) -> Self {
        Self {
            store,
            locks,
            cache,
        }
    }

    /// Delete the context row and invalidate its cache entry before releasing the lock.
    ///
    /// Tasks, variables and satellites are left in place; they are reclaimed by later
    /// sweep phases once the context id is gone. Returns `false` when the row had
    /// already disappeared.
    pub async fn delete_exec_context(&self, exec_context_id: i64) -> DispatcherResult<bool> {
        self.locks
            .exec_context
            .with_write_lock(&exec_context_id, || async {
                if self
                    .store
                    .find_exec_context_by_id(exec_context_id)
                    .await?
                    .is_none()
                {
                    self.cache.invalidate(exec_context_id);
                    debug!(exec_context_id, "Exec context already deleted");
                    return Ok(false);
                }

                let deleted = self.store.delete_exec_context(exec_context_id).await?;
                self.cache.invalidate(exec_context_id);
                if deleted {
                    info!(exec_context_id, "Exec context deleted");
                }
                Ok(deleted)
            })
            .await
    }

    /// Mark tasks stuck at NONE/IN_PROGRESS as completed, leaving their exec state as is
    pub async fn mark_lost_tasks_completed(&self, exec_context_id: i64) -> DispatcherResult<usize> {
        self.locks
            .exec_context
            .with_write_lock(&exec_context_id, || async {
                let corrected = self.store.mark_lost_tasks_completed(exec_context_id).await?;
                if corrected > 0 {
                    info!(exec_context_id, corrected, "Marked lost tasks as completed");
                }
                Ok(corrected)
            })
            .await
    }
}
