//! # Activity Gate
//!
//! Advisory backpressure signal between the live scheduling path and the
//! reclamation sweep.
//!
//! The scheduler brackets its work with [`ActivityGate::set_busy`] /
//! [`ActivityGate::not_busy`] (or holds a [`BusyGuard`]). The sweep asks
//! [`ActivityGate::is_busy`] before every low-priority phase and chunk. Besides
//! the counter, the gate samples the task queue through a [`TaskQueueProbe`], at
//! most once per probe interval, and reports busy while the last sample saw queued
//! work.
//!
//! ```rust
//! use std::sync::Arc;
//! use dispatcher_core::orchestration::ActivityGate;
//!
//! # tokio_test::block_on(async {
//! let gate = Arc::new(ActivityGate::new());
//! {
//!     let _busy = gate.enter();
//!     assert!(gate.is_busy().await);
//! }
//! assert!(!gate.is_busy().await);
//! # });
//! ```
//!
//! The gate is advisory. A false "not busy" only lets the sweep race a mutator on
//! ids that are already orphaned, and every delete tolerates a missing row.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::ActivityGateConfig;
use crate::services::TaskQueueProbe;

/// Shared busy signal, injected into both the scheduler and the sweep
pub struct ActivityGate {
    busy: AtomicUsize,
    probe: Option<Arc<dyn TaskQueueProbe>>,
    probe_interval: Duration,
    /// Time and result (`true` = queue non-empty) of the last probe
    last_sample: Mutex<Option<(Instant, bool)>>,
}

impl std::fmt::Debug for ActivityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityGate")
            .field("busy", &self.busy.load(Ordering::SeqCst))
            .field("has_probe", &self.probe.is_some())
            .field("probe_interval", &self.probe_interval)
            .finish()
    }
}

impl ActivityGate {
    /// Gate driven only by the busy counter
    pub fn new() -> Self {
        Self {
            busy: AtomicUsize::new(0),
            probe: None,
            probe_interval: Duration::ZERO,
            last_sample: Mutex::new(None),
        }
    }

    /// Gate that also samples the task queue, at most once per `probe_interval`
    pub fn with_probe(probe: Arc<dyn TaskQueueProbe>, probe_interval: Duration) -> Self {
        Self {
            probe: Some(probe),
            probe_interval,
            ..Self::new()
        }
    }

    pub fn from_config(probe: Arc<dyn TaskQueueProbe>, config: &ActivityGateConfig) -> Self {
        Self::with_probe(probe, config.queue_probe_interval())
    }

    /// Enter a busy section; nestable
    pub fn set_busy(&self) {
        self.busy.fetch_add(1, Ordering::SeqCst);
    }

    /// Leave a busy section entered with [`set_busy`](Self::set_busy)
    pub fn not_busy(&self) {
        let result = self
            .busy
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if result.is_err() {
            warn!("ActivityGate::not_busy called without a matching set_busy");
        }
    }

    /// Enter a busy section that ends when the guard drops
    pub fn enter(self: &Arc<Self>) -> BusyGuard {
        self.set_busy();
        BusyGuard {
            gate: Arc::clone(self),
        }
    }

    /// Current nesting depth of busy sections
    pub fn busy_count(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    /// Whether low-priority work should back off.
    ///
    /// True while any busy section is open, or when the most recent queue sample
    /// found queued work. A failing probe counts as busy.
    pub async fn is_busy(&self) -> bool {
        if self.busy_count() > 0 {
            return true;
        }
        let Some(probe) = &self.probe else {
            return false;
        };

        let last_sample = *self.last_sample.lock();
        if let Some((sampled_at, queue_non_empty)) = last_sample {
            if sampled_at.elapsed() < self.probe_interval {
                return queue_non_empty;
            }
        }

        let queue_non_empty = match probe.is_queue_empty_with_sync().await {
            Ok(empty) => !empty,
            Err(e) => {
                warn!(error = %e, "Task queue probe failed, treating dispatcher as busy");
                true
            }
        };
        *self.last_sample.lock() = Some((Instant::now(), queue_non_empty));
        debug!(queue_non_empty, "Sampled task queue");
        queue_non_empty
    }
}

impl Default for ActivityGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Busy section that ends on drop
#[must_use = "the busy section ends as soon as the guard is dropped"]
pub struct BusyGuard {
    gate: Arc<ActivityGate>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.gate.not_busy();
    }
}
