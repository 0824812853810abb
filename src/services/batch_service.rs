use std::sync::Arc;
use tracing::info;

use crate::database::EntityStore;
use crate::error::{DispatcherError, DispatcherResult};
use crate::sync::LockRegistries;

/// Batch operations serialized through the batch lock registry
#[derive(Clone)]
pub struct BatchService {
    store: Arc<dyn EntityStore>,
    locks: Arc<LockRegistries>,
}

impl BatchService {
    pub fn new(store: Arc<dyn EntityStore>, locks: Arc<LockRegistries>) -> Self {
        Self { store, locks }
    }

    /// Soft-delete a batch.
    ///
    /// The row stays until the reclamation sweep finds it older than the batch
    /// deletion timeout.
    pub async fn mark_deleted(&self, batch_id: i64) -> DispatcherResult<()> {
        self.locks
            .batch
            .with_write_lock(&batch_id, || async {
                if !self.store.mark_batch_deleted(batch_id).await? {
                    return Err(DispatcherError::NotFound(format!("batch #{batch_id}")));
                }
                info!(batch_id, "Batch marked as deleted");
                Ok(())
            })
            .await
    }

    /// Hard-delete a batch row; a missing row is a no-op
    pub async fn delete(&self, batch_id: i64) -> DispatcherResult<bool> {
        self.locks
            .batch
            .with_write_lock(&batch_id, || self.store.delete_batch(batch_id))
            .await
    }
}
