//! In-memory entity store for tests and local runs.
//!
//! All tables live behind one mutex so every repository call observes a consistent
//! snapshot. Mutations are appended to a journal, and individual deletes can be made
//! to fail, which lets tests observe phase ordering and failure isolation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::repositories::{
    BatchRepository, CacheRepository, CompanyRepository, DispatcherEventRepository,
    ExecContextRepository, FunctionRepository, ProcessorRepository, SatelliteRepository,
    SourceCodeRepository, TaskRepository, VariableRepository,
};
use super::tables;
use crate::error::{DispatcherError, DispatcherResult};
use crate::models::{
    Batch, CacheProcess, CacheProcessRef, CacheVariable, DispatcherEvent, ExecContext,
    ExecContextRef, FunctionData, Processor, ProcessorCore, ProcessorCoreRef, SatelliteKind,
    SatelliteRef, Task, Variable,
};
use crate::state_machine::ExecContextState;

/// One journaled mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Deleted { table: &'static str, id: i64 },
    Updated { table: &'static str, id: i64 },
}

impl StoreOperation {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Deleted { table, .. } | Self::Updated { table, .. } => table,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

#[derive(Default)]
struct Tables {
    exec_contexts: BTreeMap<i64, ExecContext>,
    source_codes: BTreeSet<i64>,
    satellites: HashMap<SatelliteKind, BTreeMap<i64, SatelliteRef>>,
    tasks: BTreeMap<i64, Task>,
    variables: BTreeMap<i64, Variable>,
    cache_processes: BTreeMap<i64, CacheProcess>,
    cache_variables: BTreeMap<i64, CacheVariable>,
    functions: BTreeSet<String>,
    function_data: BTreeMap<i64, FunctionData>,
    processors: BTreeMap<i64, Processor>,
    processor_cores: BTreeMap<i64, ProcessorCore>,
    batches: BTreeMap<i64, Batch>,
    companies: BTreeSet<i64>,
    events: BTreeMap<i64, DispatcherEvent>,
    journal: Vec<StoreOperation>,
    failing_deletes: HashSet<(&'static str, i64)>,
    /// Context ids left out of listing queries, simulating a stale snapshot
    unlisted_exec_contexts: HashSet<i64>,
    unlisted_processors: HashSet<i64>,
}

impl Tables {
    fn check_delete(&self, table: &'static str, id: i64) -> DispatcherResult<()> {
        if self.failing_deletes.contains(&(table, id)) {
            return Err(DispatcherError::DatabaseError(format!(
                "injected failure deleting {table}#{id}"
            )));
        }
        Ok(())
    }

    fn record_delete(&mut self, table: &'static str, id: i64) {
        self.journal.push(StoreOperation::Deleted { table, id });
    }
}

/// Store that keeps every table in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("MemoryStore")
            .field("exec_contexts", &tables.exec_contexts.len())
            .field("tasks", &tables.tasks.len())
            .field("variables", &tables.variables.len())
            .field("journal", &tables.journal.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- seeding -------------------------------------------------------

    pub fn insert_source_code(&self, id: i64) {
        self.tables.lock().source_codes.insert(id);
    }

    pub fn remove_source_code(&self, id: i64) {
        self.tables.lock().source_codes.remove(&id);
    }

    pub fn insert_exec_context(&self, exec_context: ExecContext) {
        self.tables
            .lock()
            .exec_contexts
            .insert(exec_context.id, exec_context);
    }

    pub fn insert_satellite(&self, kind: SatelliteKind, satellite: SatelliteRef) {
        self.tables
            .lock()
            .satellites
            .entry(kind)
            .or_default()
            .insert(satellite.id, satellite);
    }

    pub fn insert_task(&self, task: Task) {
        self.tables.lock().tasks.insert(task.id, task);
    }

    pub fn insert_variable(&self, variable: Variable) {
        self.tables.lock().variables.insert(variable.id, variable);
    }

    pub fn insert_cache_process(&self, cache_process: CacheProcess, variables: Vec<CacheVariable>) {
        let mut tables = self.tables.lock();
        for variable in variables {
            tables.cache_variables.insert(variable.id, variable);
        }
        tables
            .cache_processes
            .insert(cache_process.id, cache_process);
    }

    pub fn insert_function(&self, code: impl Into<String>) {
        self.tables.lock().functions.insert(code.into());
    }

    pub fn insert_function_data(&self, data: FunctionData) {
        self.tables.lock().function_data.insert(data.id, data);
    }

    pub fn insert_processor(&self, processor: Processor) {
        self.tables.lock().processors.insert(processor.id, processor);
    }

    pub fn remove_processor(&self, id: i64) {
        self.tables.lock().processors.remove(&id);
    }

    pub fn insert_processor_core(&self, core: ProcessorCore) {
        self.tables.lock().processor_cores.insert(core.id, core);
    }

    pub fn insert_batch(&self, batch: Batch) {
        self.tables.lock().batches.insert(batch.id, batch);
    }

    pub fn insert_company(&self, id: i64) {
        self.tables.lock().companies.insert(id);
    }

    pub fn insert_event(&self, event: DispatcherEvent) {
        self.tables.lock().events.insert(event.id, event);
    }

    // ---- fault injection -----------------------------------------------

    /// Make every delete of `table`#`id` fail with a database error
    pub fn fail_deletes_of(&self, table: &'static str, id: i64) {
        self.tables.lock().failing_deletes.insert((table, id));
    }

    pub fn clear_failures(&self) {
        self.tables.lock().failing_deletes.clear();
    }

    /// Hide a context from listing queries while keeping it readable by id
    pub fn hide_from_listing(&self, exec_context_id: i64) {
        self.tables
            .lock()
            .unlisted_exec_contexts
            .insert(exec_context_id);
    }

    /// Leave a processor out of `find_all_processor_ids` while it stays findable by id
    pub fn hide_processor_from_listing(&self, processor_id: i64) {
        self.tables.lock().unlisted_processors.insert(processor_id);
    }

    // ---- inspection ----------------------------------------------------

    pub fn journal(&self) -> Vec<StoreOperation> {
        self.tables.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.tables.lock().journal.clear();
    }

    pub fn deletions(&self) -> usize {
        self.tables
            .lock()
            .journal
            .iter()
            .filter(|op| op.is_delete())
            .count()
    }

    pub fn exec_context_ids(&self) -> Vec<i64> {
        self.tables.lock().exec_contexts.keys().copied().collect()
    }

    pub fn task(&self, id: i64) -> Option<Task> {
        self.tables.lock().tasks.get(&id).cloned()
    }

    pub fn task_ids(&self) -> Vec<i64> {
        self.tables.lock().tasks.keys().copied().collect()
    }

    pub fn variable_ids(&self) -> Vec<i64> {
        self.tables.lock().variables.keys().copied().collect()
    }

    pub fn batch_ids(&self) -> Vec<i64> {
        self.tables.lock().batches.keys().copied().collect()
    }

    pub fn batch(&self, id: i64) -> Option<Batch> {
        self.tables.lock().batches.get(&id).cloned()
    }

    pub fn cache_process_ids(&self) -> Vec<i64> {
        self.tables.lock().cache_processes.keys().copied().collect()
    }

    pub fn cache_variable_ids(&self) -> Vec<i64> {
        self.tables.lock().cache_variables.keys().copied().collect()
    }

    pub fn function_data_codes(&self) -> Vec<String> {
        self.tables
            .lock()
            .function_data
            .values()
            .map(|d| d.function_code.clone())
            .collect()
    }

    pub fn processor_core_ids(&self) -> Vec<i64> {
        self.tables.lock().processor_cores.keys().copied().collect()
    }

    pub fn satellite_ids(&self, kind: SatelliteKind) -> Vec<i64> {
        self.tables
            .lock()
            .satellites
            .get(&kind)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn event_ids(&self) -> Vec<i64> {
        self.tables.lock().events.keys().copied().collect()
    }
}

fn page_of<'a, I>(ids: I, limit: usize) -> Vec<i64>
where
    I: Iterator<Item = &'a i64>,
{
    ids.copied().take(limit).collect()
}

#[async_trait]
impl ExecContextRepository for MemoryStore {
    async fn find_all_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        let tables = self.tables.lock();
        Ok(tables
            .exec_contexts
            .keys()
            .filter(|id| !tables.unlisted_exec_contexts.contains(id))
            .copied()
            .collect())
    }

    async fn find_all_exec_context_refs(&self) -> DispatcherResult<Vec<ExecContextRef>> {
        let tables = self.tables.lock();
        Ok(tables
            .exec_contexts
            .values()
            .filter(|ec| !tables.unlisted_exec_contexts.contains(&ec.id))
            .map(ExecContext::to_ref)
            .collect())
    }

    async fn find_exec_context_by_id(&self, id: i64) -> DispatcherResult<Option<ExecContext>> {
        Ok(self.tables.lock().exec_contexts.get(&id).cloned())
    }

    async fn find_finished_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        Ok(self
            .tables
            .lock()
            .exec_contexts
            .values()
            .filter(|ec| ec.state.is_finished())
            .map(|ec| ec.id)
            .collect())
    }

    async fn delete_exec_context(&self, id: i64) -> DispatcherResult<bool> {
        let mut tables = self.tables.lock();
        tables.check_delete(tables::EXEC_CONTEXT, id)?;
        let removed = tables.exec_contexts.remove(&id).is_some();
        if removed {
            tables.record_delete(tables::EXEC_CONTEXT, id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl SourceCodeRepository for MemoryStore {
    async fn find_all_source_code_ids(&self) -> DispatcherResult<Vec<i64>> {
        Ok(self.tables.lock().source_codes.iter().copied().collect())
    }
}

#[async_trait]
impl SatelliteRepository for MemoryStore {
    async fn find_satellite_refs(&self, kind: SatelliteKind) -> DispatcherResult<Vec<SatelliteRef>> {
        Ok(self
            .tables
            .lock()
            .satellites
            .get(&kind)
            .map(|rows| rows.values().copied().collect())
            .unwrap_or_default())
    }

    async fn delete_satellite(&self, kind: SatelliteKind, id: i64) -> DispatcherResult<bool> {
        let mut tables = self.tables.lock();
        let table = kind.table_name();
        tables.check_delete(table, id)?;
        let removed = tables
            .satellites
            .get_mut(&kind)
            .map(|rows| rows.remove(&id).is_some())
            .unwrap_or(false);
        if removed {
            tables.record_delete(table, id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn find_all_task_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        let ids: BTreeSet<i64> = self
            .tables
            .lock()
            .tasks
            .values()
            .map(|t| t.exec_context_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn find_task_ids_by_exec_context(
        &self,
        exec_context_id: i64,
        limit: usize,
    ) -> DispatcherResult<Vec<i64>> {
        let tables = self.tables.lock();
        let ids = tables
            .tasks
            .values()
            .filter(|t| t.exec_context_id == exec_context_id)
            .map(|t| &t.id);
        Ok(page_of(ids, limit))
    }

    async fn delete_tasks_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize> {
        let mut tables = self.tables.lock();
        // all-or-nothing, like a single DELETE ... WHERE id IN (...)
        for id in ids {
            tables.check_delete(tables::TASK, *id)?;
        }
        let mut deleted = 0;
        for id in ids {
            if tables.tasks.remove(id).is_some() {
                tables.record_delete(tables::TASK, *id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn find_exec_context_ids_with_lost_tasks(&self) -> DispatcherResult<Vec<i64>> {
        let ids: BTreeSet<i64> = self
            .tables
            .lock()
            .tasks
            .values()
            .filter(|t| t.is_lost_candidate())
            .map(|t| t.exec_context_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn mark_lost_tasks_completed(&self, exec_context_id: i64) -> DispatcherResult<usize> {
        let mut tables = self.tables.lock();
        let corrected: Vec<i64> = tables
            .tasks
            .values_mut()
            .filter(|t| t.exec_context_id == exec_context_id && t.is_lost_candidate())
            .map(|t| {
                t.completed = true;
                t.id
            })
            .collect();
        for id in &corrected {
            tables.journal.push(StoreOperation::Updated {
                table: tables::TASK,
                id: *id,
            });
        }
        Ok(corrected.len())
    }

    async fn has_runnable_tasks(&self) -> DispatcherResult<bool> {
        let tables = self.tables.lock();
        Ok(tables.tasks.values().any(|t| {
            !t.completed
                && t.exec_state == crate::state_machine::TaskExecState::None
                && tables
                    .exec_contexts
                    .get(&t.exec_context_id)
                    .is_some_and(|ec| ec.state == ExecContextState::Started)
        }))
    }
}

#[async_trait]
impl VariableRepository for MemoryStore {
    async fn find_all_variable_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        let ids: BTreeSet<i64> = self
            .tables
            .lock()
            .variables
            .values()
            .map(|v| v.exec_context_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn find_variable_ids_by_exec_context(
        &self,
        exec_context_id: i64,
        limit: usize,
    ) -> DispatcherResult<Vec<i64>> {
        let tables = self.tables.lock();
        let ids = tables
            .variables
            .values()
            .filter(|v| v.exec_context_id == exec_context_id)
            .map(|v| &v.id);
        Ok(page_of(ids, limit))
    }

    async fn delete_variables_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize> {
        let mut tables = self.tables.lock();
        for id in ids {
            tables.check_delete(tables::VARIABLE, *id)?;
        }
        let mut deleted = 0;
        for id in ids {
            if tables.variables.remove(id).is_some() {
                tables.record_delete(tables::VARIABLE, *id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl CacheRepository for MemoryStore {
    async fn find_all_cache_process_refs(&self) -> DispatcherResult<Vec<CacheProcessRef>> {
        Ok(self
            .tables
            .lock()
            .cache_processes
            .values()
            .map(|c| CacheProcessRef {
                id: c.id,
                function_code: c.function_code.clone(),
            })
            .collect())
    }

    async fn delete_cache_process(&self, id: i64) -> DispatcherResult<bool> {
        let mut tables = self.tables.lock();
        tables.check_delete(tables::CACHE_PROCESS, id)?;
        if tables.cache_processes.remove(&id).is_none() {
            return Ok(false);
        }
        let payloads: Vec<i64> = tables
            .cache_variables
            .values()
            .filter(|v| v.cache_process_id == id)
            .map(|v| v.id)
            .collect();
        for variable_id in payloads {
            tables.cache_variables.remove(&variable_id);
            tables.record_delete(tables::CACHE_VARIABLE, variable_id);
        }
        tables.record_delete(tables::CACHE_PROCESS, id);
        Ok(true)
    }
}

#[async_trait]
impl FunctionRepository for MemoryStore {
    async fn find_all_function_codes(&self) -> DispatcherResult<Vec<String>> {
        Ok(self.tables.lock().functions.iter().cloned().collect())
    }

    async fn find_all_function_data_codes(&self) -> DispatcherResult<Vec<String>> {
        let codes: BTreeSet<String> = self
            .tables
            .lock()
            .function_data
            .values()
            .map(|d| d.function_code.clone())
            .collect();
        Ok(codes.into_iter().collect())
    }

    async fn delete_function_data_by_code(&self, function_code: &str) -> DispatcherResult<usize> {
        let mut tables = self.tables.lock();
        let ids: Vec<i64> = tables
            .function_data
            .values()
            .filter(|d| d.function_code == function_code)
            .map(|d| d.id)
            .collect();
        for id in &ids {
            tables.check_delete(tables::FUNCTION_DATA, *id)?;
        }
        for id in &ids {
            tables.function_data.remove(id);
            tables.record_delete(tables::FUNCTION_DATA, *id);
        }
        Ok(ids.len())
    }
}

#[async_trait]
impl ProcessorRepository for MemoryStore {
    async fn find_all_processor_ids(&self) -> DispatcherResult<Vec<i64>> {
        let tables = self.tables.lock();
        Ok(tables
            .processors
            .keys()
            .copied()
            .filter(|id| !tables.unlisted_processors.contains(id))
            .collect())
    }

    async fn find_processor_by_id(&self, id: i64) -> DispatcherResult<Option<Processor>> {
        Ok(self.tables.lock().processors.get(&id).cloned())
    }

    async fn find_all_processor_core_refs(&self) -> DispatcherResult<Vec<ProcessorCoreRef>> {
        Ok(self
            .tables
            .lock()
            .processor_cores
            .values()
            .map(|c| ProcessorCoreRef {
                id: c.id,
                processor_id: c.processor_id,
            })
            .collect())
    }

    async fn delete_processor_cores_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize> {
        let mut tables = self.tables.lock();
        for id in ids {
            tables.check_delete(tables::PROCESSOR_CORE, *id)?;
        }
        let mut deleted = 0;
        for id in ids {
            if tables.processor_cores.remove(id).is_some() {
                tables.record_delete(tables::PROCESSOR_CORE, *id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl BatchRepository for MemoryStore {
    async fn find_all_batches(&self) -> DispatcherResult<Vec<Batch>> {
        Ok(self.tables.lock().batches.values().cloned().collect())
    }

    async fn find_batch_by_id(&self, id: i64) -> DispatcherResult<Option<Batch>> {
        Ok(self.tables.lock().batches.get(&id).cloned())
    }

    async fn delete_batch(&self, id: i64) -> DispatcherResult<bool> {
        let mut tables = self.tables.lock();
        tables.check_delete(tables::BATCH, id)?;
        let removed = tables.batches.remove(&id).is_some();
        if removed {
            tables.record_delete(tables::BATCH, id);
        }
        Ok(removed)
    }

    async fn mark_batch_deleted(&self, id: i64) -> DispatcherResult<bool> {
        let mut tables = self.tables.lock();
        let Some(batch) = tables.batches.get_mut(&id) else {
            return Ok(false);
        };
        batch.deleted = true;
        tables.journal.push(StoreOperation::Updated {
            table: tables::BATCH,
            id,
        });
        Ok(true)
    }
}

#[async_trait]
impl CompanyRepository for MemoryStore {
    async fn find_all_company_ids(&self) -> DispatcherResult<Vec<i64>> {
        Ok(self.tables.lock().companies.iter().copied().collect())
    }
}

#[async_trait]
impl DispatcherEventRepository for MemoryStore {
    async fn delete_events_with_period_le(&self, period: i32) -> DispatcherResult<u64> {
        let mut tables = self.tables.lock();
        let ids: Vec<i64> = tables
            .events
            .values()
            .filter(|e| e.period <= period)
            .map(|e| e.id)
            .collect();
        for id in &ids {
            tables.events.remove(id);
            tables.record_delete(tables::DISPATCHER_EVENT, *id);
        }
        Ok(ids.len() as u64)
    }
}
