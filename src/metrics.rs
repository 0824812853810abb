//! # Reclamation Metrics
//!
//! OpenTelemetry instruments for the reclamation loop:
//! - Sweep run counter and duration histogram
//! - Per-phase deletion and failure counters
//! - Gate deferral counter
//!
//! Instruments are created from the global meter provider. Without an installed
//! provider they are no-ops, which is what the test-suite runs with.
//!
//! ## Usage
//!
//! ```rust
//! use dispatcher_core::metrics;
//! use opentelemetry::KeyValue;
//!
//! metrics::reclamation_deleted_total().add(3, &[KeyValue::new("phase", "orphan_tasks")]);
//! metrics::reclamation_duration().record(12.5, &[]);
//! ```

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

static DISPATCHER_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    DISPATCHER_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("dispatcher-reclamation"))
}

/// Total number of reclamation sweeps started
///
/// Labels:
/// - outcome: completed, deferred, fatal
pub fn reclamation_runs_total() -> Counter<u64> {
    meter()
        .u64_counter("dispatcher.reclamation.runs.total")
        .with_description("Total number of reclamation sweeps run")
        .build()
}

/// Total number of rows deleted by the sweep
///
/// Labels:
/// - phase: name of the reclamation phase
pub fn reclamation_deleted_total() -> Counter<u64> {
    meter()
        .u64_counter("dispatcher.reclamation.deleted.total")
        .with_description("Total number of rows reclaimed")
        .build()
}

/// Total number of entity-level failures that were logged and skipped
///
/// Labels:
/// - phase: name of the reclamation phase
pub fn reclamation_failures_total() -> Counter<u64> {
    meter()
        .u64_counter("dispatcher.reclamation.failures.total")
        .with_description("Total number of entity-level reclamation failures")
        .build()
}

/// Total number of sweeps that stopped early because the dispatcher was busy
pub fn reclamation_gate_deferrals_total() -> Counter<u64> {
    meter()
        .u64_counter("dispatcher.reclamation.gate_deferrals.total")
        .with_description("Total number of sweeps deferred by the activity gate")
        .build()
}

/// Wall-clock duration of one sweep in milliseconds
pub fn reclamation_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("dispatcher.reclamation.duration")
        .with_description("Duration of one reclamation sweep")
        .with_unit("ms")
        .build()
}

/// Record the outcome of one phase
pub fn record_phase(phase: &'static str, deleted: u64, failed: u64) {
    let labels = [KeyValue::new("phase", phase)];
    if deleted > 0 {
        reclamation_deleted_total().add(deleted, &labels);
    }
    if failed > 0 {
        reclamation_failures_total().add(failed, &labels);
    }
}
