//! # Persistence Contracts
//!
//! Narrow repository traits the reclamation sweep consumes. Each family of tables
//! gets its own trait; [`EntityStore`] is the composition every store implements.
//!
//! All deletes are idempotent: deleting an id that is already gone is a no-op that
//! reports zero affected rows, never an error. The sweep relies on this because the
//! activity gate is advisory and a concurrent writer may win a race.

use async_trait::async_trait;

use crate::error::DispatcherResult;
use crate::models::{
    Batch, CacheProcessRef, ExecContext, ExecContextRef, Processor, ProcessorCoreRef,
    SatelliteKind, SatelliteRef,
};

#[async_trait]
pub trait ExecContextRepository: Send + Sync {
    async fn find_all_exec_context_ids(&self) -> DispatcherResult<Vec<i64>>;

    async fn find_all_exec_context_refs(&self) -> DispatcherResult<Vec<ExecContextRef>>;

    async fn find_exec_context_by_id(&self, id: i64) -> DispatcherResult<Option<ExecContext>>;

    /// Contexts in a state after which no task will run again
    async fn find_finished_exec_context_ids(&self) -> DispatcherResult<Vec<i64>>;

    /// Returns `true` when a row was removed
    async fn delete_exec_context(&self, id: i64) -> DispatcherResult<bool>;
}

#[async_trait]
pub trait SourceCodeRepository: Send + Sync {
    async fn find_all_source_code_ids(&self) -> DispatcherResult<Vec<i64>>;
}

#[async_trait]
pub trait SatelliteRepository: Send + Sync {
    async fn find_satellite_refs(&self, kind: SatelliteKind) -> DispatcherResult<Vec<SatelliteRef>>;

    async fn delete_satellite(&self, kind: SatelliteKind, id: i64) -> DispatcherResult<bool>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Distinct owning context ids over all task rows
    async fn find_all_task_exec_context_ids(&self) -> DispatcherResult<Vec<i64>>;

    /// First `limit` task ids of one context
    async fn find_task_ids_by_exec_context(
        &self,
        exec_context_id: i64,
        limit: usize,
    ) -> DispatcherResult<Vec<i64>>;

    async fn delete_tasks_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize>;

    /// Distinct context ids owning at least one task stuck at NONE/IN_PROGRESS
    /// that was never marked completed
    async fn find_exec_context_ids_with_lost_tasks(&self) -> DispatcherResult<Vec<i64>>;

    /// Crash-recovery correction: mark lost tasks of one context completed
    async fn mark_lost_tasks_completed(&self, exec_context_id: i64) -> DispatcherResult<usize>;

    /// Whether any task is waiting to be assigned in a running context
    async fn has_runnable_tasks(&self) -> DispatcherResult<bool>;
}

#[async_trait]
pub trait VariableRepository: Send + Sync {
    async fn find_all_variable_exec_context_ids(&self) -> DispatcherResult<Vec<i64>>;

    async fn find_variable_ids_by_exec_context(
        &self,
        exec_context_id: i64,
        limit: usize,
    ) -> DispatcherResult<Vec<i64>>;

    async fn delete_variables_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize>;
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
    async fn find_all_cache_process_refs(&self) -> DispatcherResult<Vec<CacheProcessRef>>;

    /// Deletes the cache entry together with its cached variable payloads
    async fn delete_cache_process(&self, id: i64) -> DispatcherResult<bool>;
}

#[async_trait]
pub trait FunctionRepository: Send + Sync {
    /// Codes of all registered (non-internal) functions
    async fn find_all_function_codes(&self) -> DispatcherResult<Vec<String>>;

    /// Distinct function codes that have a stored payload
    async fn find_all_function_data_codes(&self) -> DispatcherResult<Vec<String>>;

    async fn delete_function_data_by_code(&self, function_code: &str) -> DispatcherResult<usize>;
}

#[async_trait]
pub trait ProcessorRepository: Send + Sync {
    async fn find_all_processor_ids(&self) -> DispatcherResult<Vec<i64>>;

    async fn find_processor_by_id(&self, id: i64) -> DispatcherResult<Option<Processor>>;

    async fn find_all_processor_core_refs(&self) -> DispatcherResult<Vec<ProcessorCoreRef>>;

    async fn delete_processor_cores_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize>;
}

#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn find_all_batches(&self) -> DispatcherResult<Vec<Batch>>;

    async fn find_batch_by_id(&self, id: i64) -> DispatcherResult<Option<Batch>>;

    async fn delete_batch(&self, id: i64) -> DispatcherResult<bool>;

    /// Soft delete; returns `false` when the batch does not exist
    async fn mark_batch_deleted(&self, id: i64) -> DispatcherResult<bool>;
}

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn find_all_company_ids(&self) -> DispatcherResult<Vec<i64>>;
}

#[async_trait]
pub trait DispatcherEventRepository: Send + Sync {
    /// Bulk delete of every event whose period is at or before `period`
    async fn delete_events_with_period_le(&self, period: i32) -> DispatcherResult<u64>;
}

/// Every table family the dispatcher maintains
pub trait EntityStore:
    ExecContextRepository
    + SourceCodeRepository
    + SatelliteRepository
    + TaskRepository
    + VariableRepository
    + CacheRepository
    + FunctionRepository
    + ProcessorRepository
    + BatchRepository
    + CompanyRepository
    + DispatcherEventRepository
{
}

impl<T> EntityStore for T where
    T: ExecContextRepository
        + SourceCodeRepository
        + SatelliteRepository
        + TaskRepository
        + VariableRepository
        + CacheRepository
        + FunctionRepository
        + ProcessorRepository
        + BatchRepository
        + CompanyRepository
        + DispatcherEventRepository
{
}
