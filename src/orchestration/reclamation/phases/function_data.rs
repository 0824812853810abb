use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::warn;

use super::ReclamationPhase;
use crate::error::DispatcherResult;
use crate::orchestration::reclamation::{PhaseReport, SweepContext};

/// Deletes stored function payloads whose function is no longer registered
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionDataPhase;

#[async_trait]
impl ReclamationPhase for FunctionDataPhase {
    fn name(&self) -> &'static str {
        "function_data"
    }

    async fn run(&self, ctx: &SweepContext, _now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        let registered: HashSet<String> = ctx
            .store
            .find_all_function_codes()
            .await?
            .into_iter()
            .collect();
        let obsolete: Vec<String> = ctx
            .store
            .find_all_function_data_codes()
            .await?
            .into_iter()
            .filter(|code| !registered.contains(code))
            .collect();

        let mut report = PhaseReport::with_candidates(obsolete.len());
        for chunk in obsolete.chunks(ctx.config.chunk_size.max(1)) {
            if ctx.gate.is_busy().await {
                report.interrupted = true;
                break;
            }
            for code in chunk {
                match ctx.store.delete_function_data_by_code(code).await {
                    Ok(deleted) => report.deleted += deleted,
                    Err(e) => {
                        warn!(function_code = %code, error = %e, "Failed to delete function data");
                        report.failed += 1;
                    }
                }
            }
        }
        Ok(report)
    }
}
