//! # System Constants
//!
//! Operational boundaries of the dispatcher maintenance loop.

// Re-export state types for convenience
pub use crate::state_machine::{ExecContextState, TaskExecState};

pub mod system {
    /// Version compatibility marker
    pub const DISPATCHER_CORE_VERSION: &str = "0.1.0";

    /// Event retention above this many days is treated as a misconfigured deployment
    pub const MAX_KEEP_EVENTS_IN_DB_DAYS: u64 = 100_000;

    /// Default number of candidate ids fetched per page
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Default number of ids deleted between two gate checks
    pub const DEFAULT_CHUNK_SIZE: usize = 10;
}

/// Status groupings for validation and logic
pub mod status_groups {
    use super::{ExecContextState, TaskExecState};

    /// Task states that can be left behind by a crash
    pub const LOST_TASK_STATES: &[TaskExecState] =
        &[TaskExecState::None, TaskExecState::InProgress];

    /// Context states after which no task will run again
    pub const FINISHED_EXEC_CONTEXT_STATES: &[ExecContextState] =
        &[ExecContextState::Finished, ExecContextState::Error];
}

/// Built-in internal function codes
pub mod internal_functions {
    pub const NOP: &str = "mh.nop";
    pub const FINISH: &str = "mh.finish";
    pub const PERMUTE_VARIABLES_AND_HYPER_PARAMS: &str = "mh.permute-variables-and-hyper-params";
    pub const BATCH_LINE_SPLITTER: &str = "mh.batch-line-splitter";
    pub const API_CALL: &str = "mh.api-call";
}
