//! # Entity Model Layer
//!
//! Records for every table the dispatcher keeps, plus narrow projections
//! (`*Ref`) carrying only the columns the reclamation sweep reads.
//!
//! ## Relationships
//!
//! - [`ExecContext`] owns [`Task`]s and [`Variable`]s by `exec_context_id`
//! - each context has exactly one graph, task-state and variable-state satellite
//! - a [`ProcessorCore`] belongs to one [`Processor`]
//! - a [`Batch`] references one context and one company
//! - a [`CacheProcess`] keeps [`CacheVariable`] payloads for one function code

pub mod batch;
pub mod cache_process;
pub mod dispatcher_event;
pub mod exec_context;
pub mod function_data;
pub mod processor;
pub mod task;
pub mod variable;

pub use batch::{Batch, BatchRef};
pub use cache_process::{CacheProcess, CacheProcessRef, CacheVariable};
pub use dispatcher_event::DispatcherEvent;
pub use exec_context::{ExecContext, ExecContextRef, SatelliteKind, SatelliteRef};
pub use function_data::FunctionData;
pub use processor::{Processor, ProcessorCore, ProcessorCoreRef};
pub use task::Task;
pub use variable::Variable;
