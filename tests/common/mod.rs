#![allow(dead_code)]

use std::sync::Arc;

use dispatcher_core::config::{LockRegistryConfig, ReclamationConfig};
use dispatcher_core::database::MemoryStore;
use dispatcher_core::models::{ExecContext, Task, Variable};
use dispatcher_core::orchestration::{
    ActivityGate, ReclamationPhase, ReclamationSweep, SweepContext,
};
use dispatcher_core::services::{ExecContextCache, InternalFunctionRegistry};
use dispatcher_core::sync::LockRegistries;

/// Workflow template every live fixture context is created from
pub const SOURCE_CODE_ID: i64 = 1;

/// An in-memory dispatcher wired for one reclamation sweep
pub struct SweepHarness {
    pub store: MemoryStore,
    pub gate: Arc<ActivityGate>,
    pub cache: Arc<ExecContextCache>,
    pub locks: Arc<LockRegistries>,
    pub config: ReclamationConfig,
}

impl SweepHarness {
    pub fn new() -> Self {
        Self::with_config(ReclamationConfig::default())
    }

    pub fn with_config(config: ReclamationConfig) -> Self {
        Self::with_gate(config, Arc::new(ActivityGate::new()))
    }

    pub fn with_gate(config: ReclamationConfig, gate: Arc<ActivityGate>) -> Self {
        let store = MemoryStore::new();
        store.insert_source_code(SOURCE_CODE_ID);
        Self {
            store,
            gate,
            cache: Arc::new(ExecContextCache::new()),
            locks: Arc::new(LockRegistries::new(&LockRegistryConfig::default())),
            config,
        }
    }

    pub fn context(&self) -> SweepContext {
        SweepContext::new(
            Arc::new(self.store.clone()),
            Arc::clone(&self.gate),
            Arc::clone(&self.locks),
            Arc::clone(&self.cache),
            Arc::new(InternalFunctionRegistry::new()),
            self.config.clone(),
        )
    }

    pub fn sweep(&self) -> ReclamationSweep {
        ReclamationSweep::new(self.context())
    }

    pub fn sweep_with(&self, phases: Vec<Box<dyn ReclamationPhase>>) -> ReclamationSweep {
        ReclamationSweep::with_phases(self.context(), phases)
    }

    /// Insert a live context built from the fixture template
    pub fn live_context(&self, id: i64) -> ExecContext {
        let exec_context = ExecContext::new(id, SOURCE_CODE_ID);
        self.store.insert_exec_context(exec_context.clone());
        exec_context
    }

    pub fn tasks(&self, exec_context_id: i64, ids: impl IntoIterator<Item = i64>) {
        for id in ids {
            self.store.insert_task(Task::new(id, exec_context_id));
        }
    }

    pub fn variables(&self, exec_context_id: i64, ids: impl IntoIterator<Item = i64>) {
        for id in ids {
            self.store
                .insert_variable(Variable::new(id, exec_context_id, format!("var-{id}")));
        }
    }
}
