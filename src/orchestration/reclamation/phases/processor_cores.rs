use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use super::ReclamationPhase;
use crate::error::DispatcherResult;
use crate::logging;
use crate::orchestration::reclamation::chunking::{bulk_outcome, process_in_chunks};
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Deletes cores of processors that no longer exist.
///
/// The parent is re-checked under its write lock right before deleting, since a
/// processor may re-register between the snapshot and the delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorCorePhase;

#[async_trait]
impl ReclamationPhase for ProcessorCorePhase {
    fn name(&self) -> &'static str {
        "processor_cores"
    }

    async fn run(&self, ctx: &SweepContext, _now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let processors: HashSet<i64> = ctx
            .store
            .find_all_processor_ids()
            .await?
            .into_iter()
            .collect();

        let mut orphans: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for core in ctx.store.find_all_processor_core_refs().await? {
            if !processors.contains(&core.processor_id) {
                orphans.entry(core.processor_id).or_default().push(core.id);
            }
        }

        let name = self.name();
        let mut report = PhaseReport::with_candidates(orphans.values().map(Vec::len).sum());
        for (processor_id, core_ids) in orphans {
            let outcome = ctx
                .locks
                .processor
                .with_write_lock(&processor_id, || async {
                    match ctx.store.find_processor_by_id(processor_id).await {
                        Ok(Some(_)) => {
                            logging::log_reclamation_skip(
                                name,
                                "processor",
                                processor_id,
                                "processor re-registered, keeping its cores",
                            );
                            PhaseReport {
                                skipped: core_ids.len(),
                                ..PhaseReport::default()
                            }
                        }
                        Ok(None) => {
                            process_in_chunks(ctx, &core_ids, |chunk| async move {
                                let result = ctx.store.delete_processor_cores_by_ids(&chunk).await;
                                bulk_outcome(name, &chunk, result)
                            })
                            .await
                        }
                        Err(e) => {
                            warn!(processor_id, error = %e, "Failed to re-check processor");
                            PhaseReport {
                                failed: core_ids.len(),
                                ..PhaseReport::default()
                            }
                        }
                    }
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
