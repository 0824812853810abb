//! # Reclamation Background Service
//!
//! Periodic driver of the [`ReclamationSweep`].
//!
//! ## Architecture
//!
//! - Runs on a configurable interval (default: 60 seconds)
//! - One sweep at a time: a sweep that overruns its interval delays the next tick
//!   instead of queueing a burst of catch-up ticks
//! - Stops when the shutdown channel flips to `true`
//! - A fatal sweep error (misconfiguration, sweep entered inside a transaction)
//!   stops the loop and is returned; every other failure stays inside the sweep
//!
//! ## Configuration
//!
//! Configured via `config/dispatcher/base.toml`:
//! ```toml
//! [reclamation]
//! enabled = true
//! interval_seconds = 60
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::ReclamationConfig;
use crate::error::DispatcherResult;

use super::reclamation::ReclamationSweep;

/// Background service running the reclamation sweep on a timer
#[derive(Debug, Clone)]
pub struct ReclamationService {
    sweep: Arc<ReclamationSweep>,
    config: ReclamationConfig,
}

impl ReclamationService {
    pub fn new(sweep: Arc<ReclamationSweep>, config: ReclamationConfig) -> Self {
        Self { sweep, config }
    }

    pub fn sweep(&self) -> &ReclamationSweep {
        &self.sweep
    }

    /// Run the reclamation loop until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// The first sweep starts immediately.
    ///
    /// # Errors
    ///
    /// Returns the first fatal sweep error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DispatcherResult<()> {
        if !self.config.enabled {
            info!("Reclamation disabled by configuration, not starting");
            return Ok(());
        }

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_seconds = self.config.interval_seconds,
            page_size = self.config.page_size,
            chunk_size = self.config.chunk_size,
            phases = ?self.sweep.phase_names(),
            "Starting reclamation service"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reclamation service shutting down");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    match self.sweep.run().await {
                        Ok(report)
                            if report.total_deleted() > 0
                                || report.total_corrected() > 0
                                || report.total_failed() > 0 =>
                        {
                            info!(
                                sweep_id = %report.sweep_id,
                                deleted = report.total_deleted(),
                                corrected = report.total_corrected(),
                                failed = report.total_failed(),
                                deferred = report.deferred,
                                "Reclamation tick completed"
                            );
                        }
                        Ok(report) => {
                            debug!(
                                sweep_id = %report.sweep_id,
                                deferred = report.deferred,
                                "Nothing reclaimed this tick"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Reclamation stopped by fatal error");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}
