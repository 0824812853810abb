//! # Dispatcher Services
//!
//! Collaborators shared by the scheduling path and the reclamation sweep.

pub mod batch_service;
pub mod exec_context_cache;
pub mod exec_context_service;
pub mod internal_function_registry;
pub mod task_queue;

pub use batch_service::BatchService;
pub use exec_context_cache::ExecContextCache;
pub use exec_context_service::ExecContextService;
pub use internal_function_registry::{InternalFunction, InternalFunctionRegistry};
pub use task_queue::{StoreQueueProbe, TaskQueueProbe};
