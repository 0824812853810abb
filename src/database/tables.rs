//! Table names shared by the stores and the operation journal.

pub const EXEC_CONTEXT: &str = "mh_exec_context";
pub const EXEC_CONTEXT_GRAPH: &str = "mh_exec_context_graph";
pub const EXEC_CONTEXT_TASK_STATE: &str = "mh_exec_context_task_state";
pub const EXEC_CONTEXT_VARIABLE_STATE: &str = "mh_exec_context_variable_state";
pub const TASK: &str = "mh_task";
pub const VARIABLE: &str = "mh_variable";
pub const CACHE_PROCESS: &str = "mh_cache_process";
pub const CACHE_VARIABLE: &str = "mh_cache_variable";
pub const PROCESSOR: &str = "mh_processor";
pub const PROCESSOR_CORE: &str = "mh_processor_core";
pub const BATCH: &str = "mh_batch";
pub const COMPANY: &str = "mh_company";
pub const SOURCE_CODE: &str = "mh_source_code";
pub const FUNCTION: &str = "mh_function";
pub const FUNCTION_DATA: &str = "mh_function_data";
pub const DISPATCHER_EVENT: &str = "mh_dispatcher_event";
