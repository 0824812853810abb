use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::{live_exec_context_ids, ReclamationPhase};
use crate::error::DispatcherResult;
use crate::models::SatelliteKind;
use crate::orchestration::reclamation::chunking::{process_in_chunks, single_outcome};
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Deletes graph, task-state and variable-state rows of missing contexts.
///
/// A satellite of a brand-new context may not be linked yet when the id snapshot
/// is read, so rows younger than their kind's grace window are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SatellitePhase;

#[async_trait]
impl ReclamationPhase for SatellitePhase {
    fn name(&self) -> &'static str {
        "satellites"
    }

    async fn run(&self, ctx: &SweepContext, now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let live = live_exec_context_ids(ctx).await?;
        let name = self.name();
        let mut report = PhaseReport::default();

        // Lock acquisition order: graph, task state, variable state
        for kind in SatelliteKind::ALL {
            // A window past the representable range saturates: nothing is old enough
            let grace = Duration::from_std(kind.grace_window(&ctx.config)).unwrap_or(Duration::MAX);
            let Some(cutoff) = now.checked_sub_signed(grace) else {
                debug!(phase = name, satellite = %kind, "Grace window reaches past time range, skipping");
                continue;
            };

            let orphans: Vec<i64> = ctx
                .store
                .find_satellite_refs(kind)
                .await?
                .into_iter()
                .filter(|row| {
                    !live.contains(&row.exec_context_id)
                        && !ctx.cache.contains(row.exec_context_id)
                        && row.created_on < cutoff
                })
                .map(|row| row.id)
                .collect();
            report.candidates += orphans.len();

            let registry = ctx.locks.satellite(kind);
            let outcome = process_in_chunks(ctx, &orphans, |chunk| async move {
                let mut outcome = PhaseReport::default();
                for id in chunk {
                    let result = registry
                        .with_write_lock(&id, || ctx.store.delete_satellite(kind, id))
                        .await;
                    outcome.merge(single_outcome(name, id, result));
                }
                outcome
            })
            .await;

            let interrupted = outcome.interrupted;
            report.merge(outcome);
            if interrupted {
                break;
            }
        }
        Ok(report)
    }
}
