use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{live_exec_context_ids, ReclamationPhase};
use crate::error::DispatcherResult;
use crate::logging;
use crate::orchestration::reclamation::chunking::{bulk_outcome, process_in_chunks};
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Row types owned directly by an exec context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanChild {
    Task,
    Variable,
}

impl OrphanChild {
    fn phase_name(self) -> &'static str {
        match self {
            Self::Task => "orphan_tasks",
            Self::Variable => "orphan_variables",
        }
    }

    async fn owner_ids(self, ctx: &SweepContext) -> DispatcherResult<Vec<i64>> {
        match self {
            Self::Task => ctx.store.find_all_task_exec_context_ids().await,
            Self::Variable => ctx.store.find_all_variable_exec_context_ids().await,
        }
    }

    async fn page(self, ctx: &SweepContext, exec_context_id: i64) -> DispatcherResult<Vec<i64>> {
        let limit = ctx.config.page_size;
        match self {
            Self::Task => {
                ctx.store
                    .find_task_ids_by_exec_context(exec_context_id, limit)
                    .await
            }
            Self::Variable => {
                ctx.store
                    .find_variable_ids_by_exec_context(exec_context_id, limit)
                    .await
            }
        }
    }

    async fn delete(self, ctx: &SweepContext, ids: &[i64]) -> DispatcherResult<usize> {
        match self {
            Self::Task => ctx.store.delete_tasks_by_ids(ids).await,
            Self::Variable => ctx.store.delete_variables_by_ids(ids).await,
        }
    }
}

/// Deletes tasks or variables whose exec context no longer exists.
///
/// Before touching an orphan context's rows, the context id is re-checked against
/// the in-memory cache (a cached context may not be committed yet) and against the
/// store (a row may have reappeared since the id snapshot was read).
#[derive(Debug, Clone, Copy)]
pub struct OrphanChildPhase {
    child: OrphanChild,
}

impl OrphanChildPhase {
    pub fn new(child: OrphanChild) -> Self {
        Self { child }
    }

    /// Page through one orphan context's rows until none are left
    async fn drain(&self, ctx: &SweepContext, exec_context_id: i64) -> PhaseReport {
        let phase = self.child.phase_name();
        let child = self.child;
        let mut report = PhaseReport::default();

        loop {
            let page = match child.page(ctx, exec_context_id).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(phase, exec_context_id, error = %e, "Failed to page orphan rows");
                    report.failed += 1;
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            let page_report = process_in_chunks(ctx, &page, |chunk| async move {
                let result = child.delete(ctx, &chunk).await;
                bulk_outcome(phase, &chunk, result)
            })
            .await;

            let progressed = page_report.deleted > 0;
            let interrupted = page_report.interrupted;
            report.merge(page_report);
            // A page that deleted nothing would be fetched again unchanged
            if interrupted || !progressed {
                break;
            }
        }
        report
    }
}

#[async_trait]
impl ReclamationPhase for OrphanChildPhase {
    fn name(&self) -> &'static str {
        self.child.phase_name()
    }

    async fn run(&self, ctx: &SweepContext, _now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let live = live_exec_context_ids(ctx).await?;
        let orphan_owners: Vec<i64> = self
            .child
            .owner_ids(ctx)
            .await?
            .into_iter()
            .filter(|id| !live.contains(id))
            .collect();

        let phase = self.name();
        let mut report = PhaseReport::with_candidates(orphan_owners.len());
        for exec_context_id in orphan_owners {
            if ctx.cache.contains(exec_context_id) {
                debug!(phase, exec_context_id, "Exec context still cached, deferring cleanup");
                report.skipped += 1;
                continue;
            }
            match ctx.store.find_exec_context_by_id(exec_context_id).await {
                Ok(Some(_)) => {
                    logging::log_reclamation_skip(
                        phase,
                        "exec_context",
                        exec_context_id,
                        "exec context reappeared after the id snapshot",
                    );
                    report.skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(phase, exec_context_id, error = %e, "Failed to re-check exec context");
                    report.failed += 1;
                    continue;
                }
            }

            let drained = ctx
                .locks
                .exec_context
                .with_write_lock(&exec_context_id, || self.drain(ctx, exec_context_id))
                .await;
            let interrupted = drained.interrupted;
            report.merge(drained);
            if interrupted {
                break;
            }
        }
        Ok(report)
    }
}
