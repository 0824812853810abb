use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::time::Duration;

use crate::config::ReclamationConfig;
use crate::database::tables;
use crate::state_machine::ExecContextState;

/// A running instance of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecContext {
    pub id: i64,
    /// Workflow template this context was created from
    pub source_code_id: i64,
    /// Parent context for nested sub-workflows
    pub root_exec_context_id: Option<i64>,
    pub state: ExecContextState,
    pub created_on: DateTime<Utc>,
}

impl ExecContext {
    pub fn new(id: i64, source_code_id: i64) -> Self {
        Self {
            id,
            source_code_id,
            root_exec_context_id: None,
            state: ExecContextState::None,
            created_on: Utc::now(),
        }
    }

    pub fn with_root(mut self, root_exec_context_id: i64) -> Self {
        self.root_exec_context_id = Some(root_exec_context_id);
        self
    }

    pub fn with_state(mut self, state: ExecContextState) -> Self {
        self.state = state;
        self
    }

    pub fn to_ref(&self) -> ExecContextRef {
        ExecContextRef {
            id: self.id,
            source_code_id: self.source_code_id,
            root_exec_context_id: self.root_exec_context_id,
        }
    }
}

/// Reference columns used to decide whether a context is orphaned
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ExecContextRef {
    pub id: i64,
    pub source_code_id: i64,
    pub root_exec_context_id: Option<i64>,
}

/// The three per-context satellite tables, split for lock granularity and payload size.
///
/// Variants are declared in lock acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatelliteKind {
    Graph,
    TaskState,
    VariableState,
}

impl SatelliteKind {
    pub const ALL: [SatelliteKind; 3] = [Self::Graph, Self::TaskState, Self::VariableState];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Graph => tables::EXEC_CONTEXT_GRAPH,
            Self::TaskState => tables::EXEC_CONTEXT_TASK_STATE,
            Self::VariableState => tables::EXEC_CONTEXT_VARIABLE_STATE,
        }
    }

    /// Minimum age before an unreferenced satellite may be deleted
    pub fn grace_window(&self, config: &ReclamationConfig) -> Duration {
        let seconds = match self {
            Self::Graph => config.graph_grace_seconds,
            Self::TaskState => config.task_state_grace_seconds,
            Self::VariableState => config.variable_state_grace_seconds,
        };
        Duration::from_secs(seconds)
    }
}

impl fmt::Display for SatelliteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph => write!(f, "exec_context_graph"),
            Self::TaskState => write!(f, "exec_context_task_state"),
            Self::VariableState => write!(f, "exec_context_variable_state"),
        }
    }
}

/// A satellite row as seen by the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct SatelliteRef {
    pub id: i64,
    pub exec_context_id: i64,
    pub created_on: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grace_windows() {
        let config = ReclamationConfig::default();
        assert_eq!(
            SatelliteKind::Graph.grace_window(&config),
            Duration::from_secs(3600)
        );
        assert_eq!(
            SatelliteKind::TaskState.grace_window(&config),
            Duration::from_secs(5 * 3600)
        );
        assert_eq!(
            SatelliteKind::VariableState.grace_window(&config),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_builder_helpers() {
        let ctx = ExecContext::new(7, 3)
            .with_root(1)
            .with_state(ExecContextState::Started);
        assert_eq!(ctx.to_ref().root_exec_context_id, Some(1));
        assert_eq!(ctx.state, ExecContextState::Started);
    }
}
