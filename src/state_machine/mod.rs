// State definitions for tasks and execution contexts
//
// The dispatcher core does not drive the task lifecycle; it only reads these states
// to decide what is lost or finished, and performs the single crash-recovery
// correction of marking lost tasks completed.

pub mod states;

// Re-export main types for convenient access
pub use states::{ExecContextState, TaskExecState};
