use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::warn;

use super::ReclamationPhase;
use crate::error::DispatcherResult;
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Crash recovery: tasks still at NONE/IN_PROGRESS inside a finished context are
/// marked completed. `exec_state` is not touched and nothing is re-executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LostTaskPhase;

#[async_trait]
impl ReclamationPhase for LostTaskPhase {
    fn name(&self) -> &'static str {
        "lost_tasks"
    }

    fn gated(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &SweepContext, _now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let finished: HashSet<i64> = ctx
            .store
            .find_finished_exec_context_ids()
            .await?
            .into_iter()
            .collect();
        let affected: Vec<i64> = ctx
            .store
            .find_exec_context_ids_with_lost_tasks()
            .await?
            .into_iter()
            .filter(|id| finished.contains(id))
            .collect();

        let mut report = PhaseReport::with_candidates(affected.len());
        for exec_context_id in affected {
            match ctx.exec_contexts.mark_lost_tasks_completed(exec_context_id).await {
                Ok(corrected) => report.corrected += corrected,
                Err(e) => {
                    warn!(exec_context_id, error = %e, "Failed to correct lost tasks");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
