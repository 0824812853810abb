//! # Reclamation Orchestration
//!
//! Keeps the persistent store free of rows nothing can reach anymore, without
//! competing with the scheduling path for locks or database time.
//!
//! ## Core Components
//!
//! - **ActivityGate**: process-wide "busy" signal raised by request handlers and the
//!   task queue; the sweep backs off while it is up
//! - **ReclamationSweep**: one pass over the ordered reclamation phases
//! - **ReclamationService**: periodic driver of the sweep with graceful shutdown
//!
//! ## Phase Order
//!
//! Parents go before children so one tick can clear a whole subtree:
//!
//! 1. orphan execution contexts
//! 2. lost tasks of finished contexts
//! 3. *(gate check, every phase below is skipped while busy)*
//! 4. batches past retention
//! 5. tasks of missing contexts
//! 6. variables of missing contexts
//! 7. unused cache entries
//! 8. dispatcher events past retention
//! 9. obsolete function data
//! 10. cores of missing processors
//! 11. graph and state satellites of missing contexts

pub mod activity_gate;
pub mod reclamation;
pub mod reclamation_service;

pub use activity_gate::{ActivityGate, BusyGuard};
pub use reclamation::{
    default_phases, PhaseReport, ReclamationPhase, ReclamationSweep, SweepContext, SweepReport,
};
pub use reclamation_service::ReclamationService;
