use serde::{Deserialize, Serialize};

use crate::state_machine::TaskExecState;

/// A unit of work belonging to one execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub exec_context_id: i64,
    pub exec_state: TaskExecState,
    /// Processor core the task was assigned to, when executed externally
    pub core_id: Option<i64>,
    /// Finished marker, also set by crash recovery without touching `exec_state`
    pub completed: bool,
}

impl Task {
    pub fn new(id: i64, exec_context_id: i64) -> Self {
        Self {
            id,
            exec_context_id,
            exec_state: TaskExecState::None,
            core_id: None,
            completed: false,
        }
    }

    pub fn with_state(mut self, exec_state: TaskExecState) -> Self {
        self.exec_state = exec_state;
        self.completed = exec_state.is_finished();
        self
    }

    pub fn assigned_to(mut self, core_id: i64) -> Self {
        self.core_id = Some(core_id);
        self
    }

    /// Not finished by a processor and not yet corrected by crash recovery
    pub fn is_lost_candidate(&self) -> bool {
        !self.completed && self.exec_state.is_lost_candidate()
    }
}
