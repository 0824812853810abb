use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::ReclamationPhase;
use crate::error::DispatcherResult;
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Deletes contexts whose parent context or workflow template is gone.
///
/// Ungated: processors must learn that a workflow is gone as early as possible.
/// Only the context row is deleted here; its tasks, variables and satellites
/// become orphans for the later phases.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrphanExecContextPhase;

#[async_trait]
impl ReclamationPhase for OrphanExecContextPhase {
    fn name(&self) -> &'static str {
        "orphan_exec_contexts"
    }

    fn gated(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &SweepContext, _now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let refs = ctx.store.find_all_exec_context_refs().await?;
        let live: HashSet<i64> = refs.iter().map(|r| r.id).collect();
        let source_codes: HashSet<i64> = ctx
            .store
            .find_all_source_code_ids()
            .await?
            .into_iter()
            .collect();

        let orphans: Vec<i64> = refs
            .iter()
            .filter(|r| {
                r.root_exec_context_id
                    .is_some_and(|root| !live.contains(&root))
                    || !source_codes.contains(&r.source_code_id)
            })
            .map(|r| r.id)
            .collect();

        let mut report = PhaseReport::with_candidates(orphans.len());
        for exec_context_id in orphans {
            match ctx.exec_contexts.delete_exec_context(exec_context_id).await {
                Ok(true) => report.deleted += 1,
                Ok(false) => {
                    debug!(exec_context_id, "Orphan exec context already gone");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(exec_context_id, error = %e, "Failed to delete orphan exec context");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
