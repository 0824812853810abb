use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::ReclamationPhase;
use crate::error::DispatcherResult;
use crate::orchestration::reclamation::chunking::{process_in_chunks, single_outcome};
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Deletes cache entries produced by a function that is neither registered nor a
/// cachable internal function, together with their cached variable payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheEntryPhase;

#[async_trait]
impl ReclamationPhase for CacheEntryPhase {
    fn name(&self) -> &'static str {
        "cache_entries"
    }

    async fn run(&self, ctx: &SweepContext, _now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let mut known: HashSet<String> = ctx
            .store
            .find_all_function_codes()
            .await?
            .into_iter()
            .collect();
        known.extend(ctx.internal_functions.cachable_codes());

        let orphans: Vec<i64> = ctx
            .store
            .find_all_cache_process_refs()
            .await?
            .into_iter()
            .filter(|entry| !known.contains(&entry.function_code))
            .map(|entry| entry.id)
            .collect();

        let name = self.name();
        let mut report = PhaseReport::with_candidates(orphans.len());
        report.merge(
            process_in_chunks(ctx, &orphans, |chunk| async move {
                let mut outcome = PhaseReport::default();
                for id in chunk {
                    let result = ctx.store.delete_cache_process(id).await;
                    outcome.merge(single_outcome(name, id, result));
                }
                outcome
            })
            .await,
        );
        Ok(report)
    }
}
