//! # Reclamation Sweep
//!
//! Periodic reconciler that deletes orphaned and obsolete rows across the
//! persisted entity graph while the scheduler keeps mutating it.
//!
//! ## Phases
//!
//! The sweep is an ordered list of [`ReclamationPhase`] objects, see
//! [`phases::default_phases`]:
//!
//! 1. Orphan exec contexts (always runs)
//! 2. Lost task state correction (always runs)
//! 3. Activity gate check: every later phase is `gated()`, and the sweep stops at
//!    the first gated phase that finds the dispatcher busy
//! 4. Orphan/obsolete batches
//! 5. Orphan tasks
//! 6. Orphan variables
//! 7. Orphan cache entries
//! 8. Obsolete dispatcher events
//! 9. Obsolete function data
//! 10. Orphan processor cores
//! 11. Orphan exec context satellites
//!
//! ## Failure isolation
//!
//! Entity-level failures are logged and counted in the [`PhaseReport`]. A phase
//! error is logged and the sweep moves to the next phase, unless the error is
//! [`fatal`](crate::error::DispatcherError::is_fatal), which aborts the sweep.
//!
//! No cursor is persisted. Every tick re-derives what is orphaned now, so work cut
//! short by the gate is picked up by a later tick.

mod chunking;
pub mod phases;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ReclamationConfig;
use crate::database::{transaction, EntityStore};
use crate::error::{DispatcherError, DispatcherResult};
use crate::logging;
use crate::metrics;
use crate::services::{ExecContextCache, ExecContextService, InternalFunctionRegistry};
use crate::sync::LockRegistries;

use super::ActivityGate;

pub use phases::{default_phases, ReclamationPhase};

/// Everything a phase needs; shared by all phases of one sweep
#[derive(Clone)]
pub struct SweepContext {
    pub store: Arc<dyn EntityStore>,
    pub gate: Arc<ActivityGate>,
    pub locks: Arc<LockRegistries>,
    pub cache: Arc<ExecContextCache>,
    pub internal_functions: Arc<InternalFunctionRegistry>,
    pub exec_contexts: ExecContextService,
    pub config: ReclamationConfig,
}

impl std::fmt::Debug for SweepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepContext")
            .field("gate", &self.gate)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SweepContext {
    pub fn new(
        store: Arc<dyn EntityStore>,
        gate: Arc<ActivityGate>,
        locks: Arc<LockRegistries>,
        cache: Arc<ExecContextCache>,
        internal_functions: Arc<InternalFunctionRegistry>,
        config: ReclamationConfig,
    ) -> Self {
        let exec_contexts =
            ExecContextService::new(Arc::clone(&store), Arc::clone(&locks), Arc::clone(&cache));
        Self {
            store,
            gate,
            locks,
            cache,
            internal_functions,
            exec_contexts,
            config,
        }
    }
}

/// Counters of one phase run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    /// Orphaned or obsolete entities found. Child-row phases count owning contexts.
    pub candidates: usize,
    /// Rows deleted
    pub deleted: usize,
    /// Rows updated in place instead of deleted (lost task recovery)
    pub corrected: usize,
    /// Rows whose delete failed and were left for a later tick
    pub failed: usize,
    /// Candidates left alone because a re-check contradicted the orphan test
    pub skipped: usize,
    /// The gate turned busy mid-phase and the remaining candidates were left
    pub interrupted: bool,
    /// Phase-level error that ended the phase early
    pub error: Option<String>,
}

impl PhaseReport {
    pub fn with_candidates(candidates: usize) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    pub(crate) fn merge(&mut self, other: PhaseReport) {
        self.deleted += other.deleted;
        self.corrected += other.corrected;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.interrupted |= other.interrupted;
        if self.error.is_none() {
            self.error = other.error;
        }
    }

    pub fn status(&self) -> &'static str {
        if self.error.is_some() {
            "failed"
        } else if self.interrupted {
            "interrupted"
        } else {
            "completed"
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    /// Phases that ran, in execution order
    pub phases: Vec<(&'static str, PhaseReport)>,
    /// The gate stopped the sweep before every phase had run to completion
    pub deferred: bool,
    #[serde(skip)]
    pub duration: Duration,
}

impl SweepReport {
    fn new() -> Self {
        Self {
            sweep_id: Uuid::new_v4(),
            phases: Vec::new(),
            deferred: false,
            duration: Duration::ZERO,
        }
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseReport> {
        self.phases
            .iter()
            .find(|(phase, _)| *phase == name)
            .map(|(_, report)| report)
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|(name, _)| *name).collect()
    }

    pub fn total_deleted(&self) -> usize {
        self.phases.iter().map(|(_, report)| report.deleted).sum()
    }

    pub fn total_corrected(&self) -> usize {
        self.phases.iter().map(|(_, report)| report.corrected).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.phases.iter().map(|(_, report)| report.failed).sum()
    }
}

/// The ordered reclamation sweep
pub struct ReclamationSweep {
    ctx: SweepContext,
    phases: Vec<Box<dyn ReclamationPhase>>,
}

impl std::fmt::Debug for ReclamationSweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReclamationSweep")
            .field("phases", &self.phase_names())
            .finish_non_exhaustive()
    }
}

impl ReclamationSweep {
    pub fn new(ctx: SweepContext) -> Self {
        Self::with_phases(ctx, default_phases())
    }

    pub fn with_phases(ctx: SweepContext, phases: Vec<Box<dyn ReclamationPhase>>) -> Self {
        Self { ctx, phases }
    }

    pub fn context(&self) -> &SweepContext {
        &self.ctx
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|phase| phase.name()).collect()
    }

    pub async fn run(&self) -> DispatcherResult<SweepReport> {
        self.run_at(Utc::now()).await
    }

    /// Run every phase against the reference time `now`.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: `InvalidState` when called inside a store
    /// transaction, or a fatal phase error such as an out-of-range event retention.
    pub async fn run_at(&self, now: DateTime<Utc>) -> DispatcherResult<SweepReport> {
        if transaction::is_active() {
            return Err(DispatcherError::InvalidState(
                "reclamation sweep must not run inside a transaction".to_string(),
            ));
        }

        let started = Instant::now();
        let mut report = SweepReport::new();
        info!(sweep_id = %report.sweep_id, "Starting reclamation sweep");

        for phase in &self.phases {
            let name = phase.name();
            if phase.gated() && self.ctx.gate.is_busy().await {
                info!(
                    sweep_id = %report.sweep_id,
                    phase = name,
                    "Dispatcher busy, deferring remaining reclamation phases"
                );
                report.deferred = true;
                break;
            }

            let phase_report = match phase.run(&self.ctx, now).await {
                Ok(phase_report) => phase_report,
                Err(e) if e.is_fatal() => {
                    error!(
                        sweep_id = %report.sweep_id,
                        phase = name,
                        error = %e,
                        "Fatal error, aborting reclamation sweep"
                    );
                    metrics::reclamation_runs_total().add(1, &[KeyValue::new("outcome", "fatal")]);
                    return Err(e);
                }
                Err(e) => {
                    logging::log_error("reclamation", name, &e.to_string(), None);
                    PhaseReport {
                        error: Some(e.to_string()),
                        ..PhaseReport::default()
                    }
                }
            };

            logging::log_reclamation_phase(
                name,
                phase_report.candidates,
                phase_report.deleted,
                phase_report.failed,
                phase_report.status(),
            );
            metrics::record_phase(name, phase_report.deleted as u64, phase_report.failed as u64);

            let interrupted = phase_report.interrupted;
            report.phases.push((name, phase_report));
            if interrupted {
                report.deferred = true;
                break;
            }
        }

        report.duration = started.elapsed();
        let outcome = if report.deferred { "deferred" } else { "completed" };
        metrics::reclamation_runs_total().add(1, &[KeyValue::new("outcome", outcome)]);
        metrics::reclamation_duration().record(report.duration.as_secs_f64() * 1000.0, &[]);
        if report.deferred {
            metrics::reclamation_gate_deferrals_total().add(1, &[]);
        }

        info!(
            sweep_id = %report.sweep_id,
            phases_run = report.phases.len(),
            deleted = report.total_deleted(),
            corrected = report.total_corrected(),
            failed = report.total_failed(),
            deferred = report.deferred,
            duration_ms = report.duration.as_millis() as u64,
            "Reclamation sweep finished"
        );
        Ok(report)
    }
}
