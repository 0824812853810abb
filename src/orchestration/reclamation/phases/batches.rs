use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::{live_exec_context_ids, ReclamationPhase};
use crate::error::DispatcherResult;
use crate::orchestration::reclamation::chunking::{process_in_chunks, single_outcome};
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Deletes batches that were soft-deleted longer ago than the retention timeout,
/// or whose context or company no longer exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPhase;

#[async_trait]
impl ReclamationPhase for BatchPhase {
    fn name(&self) -> &'static str {
        "batches"
    }

    async fn run(&self, ctx: &SweepContext, now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let live = live_exec_context_ids(ctx).await?;
        let companies: HashSet<i64> = ctx
            .store
            .find_all_company_ids()
            .await?
            .into_iter()
            .collect();
        // None when the timeout reaches past the representable range: nothing is old enough
        let cutoff = now.checked_sub_signed(ctx.config.batch_deletion_timeout());

        let candidates: Vec<i64> = ctx
            .store
            .find_all_batches()
            .await?
            .into_iter()
            .filter(|batch| {
                let obsolete = batch.deleted && cutoff.is_some_and(|c| batch.created_on < c);
                let orphan = !live.contains(&batch.exec_context_id)
                    || !companies.contains(&batch.company_id);
                obsolete || orphan
            })
            .map(|batch| batch.id)
            .collect();

        let name = self.name();
        let mut report = PhaseReport::with_candidates(candidates.len());
        report.merge(
            process_in_chunks(ctx, &candidates, |chunk| async move {
                let mut outcome = PhaseReport::default();
                for batch_id in chunk {
                    let result = ctx
                        .locks
                        .batch
                        .with_write_lock(&batch_id, || ctx.store.delete_batch(batch_id))
                        .await;
                    outcome.merge(single_outcome(name, batch_id, result));
                }
                outcome
            })
            .await,
        );
        Ok(report)
    }
}
