use crate::config::LockRegistryConfig;
use crate::models::SatelliteKind;

use super::KeyedLockRegistry;

/// One keyed lock registry per aggregate root.
///
/// When a call site needs more than one of these, it acquires them in field
/// declaration order:
///
/// `exec_context` → `exec_context_graph` → `exec_context_task_state` →
/// `exec_context_variable_state` → task/variable work, which runs under the owning
/// context's lock. `processor` and `batch` are never nested with the others.
#[derive(Debug)]
pub struct LockRegistries {
    pub exec_context: KeyedLockRegistry<i64>,
    pub exec_context_graph: KeyedLockRegistry<i64>,
    pub exec_context_task_state: KeyedLockRegistry<i64>,
    pub exec_context_variable_state: KeyedLockRegistry<i64>,
    pub processor: KeyedLockRegistry<i64>,
    pub batch: KeyedLockRegistry<i64>,
}

impl LockRegistries {
    pub fn new(config: &LockRegistryConfig) -> Self {
        Self {
            exec_context: KeyedLockRegistry::from_config("exec_context", config),
            exec_context_graph: KeyedLockRegistry::from_config("exec_context_graph", config),
            exec_context_task_state: KeyedLockRegistry::from_config(
                "exec_context_task_state",
                config,
            ),
            exec_context_variable_state: KeyedLockRegistry::from_config(
                "exec_context_variable_state",
                config,
            ),
            processor: KeyedLockRegistry::from_config("processor", config),
            batch: KeyedLockRegistry::from_config("batch", config),
        }
    }

    /// Registry guarding the rows of one satellite table
    pub fn satellite(&self, kind: SatelliteKind) -> &KeyedLockRegistry<i64> {
        match kind {
            SatelliteKind::Graph => &self.exec_context_graph,
            SatelliteKind::TaskState => &self.exec_context_task_state,
            SatelliteKind::VariableState => &self.exec_context_variable_state,
        }
    }
}

impl Default for LockRegistries {
    fn default() -> Self {
        Self::new(&LockRegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_registries_are_independent() {
        let locks = LockRegistries::default();
        let ec = locks.exec_context.lock_for(&1);
        let graph = locks.satellite(SatelliteKind::Graph).lock_for(&1);
        assert!(!Arc::ptr_eq(&ec, &graph));
        assert_eq!(
            locks.satellite(SatelliteKind::TaskState).name(),
            "exec_context_task_state"
        );
    }
}
