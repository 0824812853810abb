//! Read-through cache of execution contexts.
//!
//! The scheduler keeps hot contexts here. The sweep treats a cached id as alive
//! even when its row is missing, since the cache may be ahead of a commit.

use dashmap::DashMap;
use tracing::trace;

use crate::database::ExecContextRepository;
use crate::error::DispatcherResult;
use crate::models::ExecContext;

#[derive(Debug, Default)]
pub struct ExecContextCache {
    entries: DashMap<i64, ExecContext>,
}

impl ExecContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<ExecContext> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// Cached context, loading and caching it from `repository` on a miss
    pub async fn get_or_load(
        &self,
        repository: &dyn ExecContextRepository,
        id: i64,
    ) -> DispatcherResult<Option<ExecContext>> {
        if let Some(cached) = self.get(id) {
            return Ok(Some(cached));
        }
        let loaded = repository.find_exec_context_by_id(id).await?;
        if let Some(exec_context) = &loaded {
            self.insert(exec_context.clone());
        }
        Ok(loaded)
    }

    pub fn insert(&self, exec_context: ExecContext) {
        self.entries.insert(exec_context.id, exec_context);
    }

    /// Drop `id` from the cache; returns whether it was present
    pub fn invalidate(&self, id: i64) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            trace!(exec_context_id = id, "Invalidated cached exec context");
        }
        removed
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
