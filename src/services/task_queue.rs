use async_trait::async_trait;
use std::sync::Arc;

use crate::database::EntityStore;
use crate::error::DispatcherResult;

/// View of the scheduler's task queue used by the activity gate
#[async_trait]
pub trait TaskQueueProbe: Send + Sync {
    /// Whether no task is waiting for assignment, after syncing with persisted state
    async fn is_queue_empty_with_sync(&self) -> DispatcherResult<bool>;
}

/// Probe that treats any runnable task in a started context as a queued task
#[derive(Clone)]
pub struct StoreQueueProbe {
    store: Arc<dyn EntityStore>,
}

impl StoreQueueProbe {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskQueueProbe for StoreQueueProbe {
    async fn is_queue_empty_with_sync(&self) -> DispatcherResult<bool> {
        Ok(!self.store.has_runnable_tasks().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::{ExecContext, Task};
    use crate::state_machine::{ExecContextState, TaskExecState};

    #[tokio::test]
    async fn test_queue_reflects_runnable_tasks() {
        let store = MemoryStore::new();
        let probe = StoreQueueProbe::new(Arc::new(store.clone()));
        assert!(probe.is_queue_empty_with_sync().await.unwrap());

        store.insert_exec_context(ExecContext::new(1, 1).with_state(ExecContextState::Stopped));
        store.insert_task(Task::new(10, 1));
        assert!(probe.is_queue_empty_with_sync().await.unwrap());

        store.insert_exec_context(ExecContext::new(2, 1).with_state(ExecContextState::Started));
        store.insert_task(Task::new(20, 2).with_state(TaskExecState::Ok));
        assert!(probe.is_queue_empty_with_sync().await.unwrap());

        store.insert_task(Task::new(21, 2));
        assert!(!probe.is_queue_empty_with_sync().await.unwrap());
    }
}
