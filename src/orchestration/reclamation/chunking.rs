use std::future::Future;
use tracing::warn;

use crate::error::DispatcherResult;

use super::{PhaseReport, SweepContext};

/// Process `ids` in chunks of `chunk_size`, checking the gate before each chunk.
///
/// Stops with `interrupted` set as soon as the gate reports busy.
pub(crate) async fn process_in_chunks<F, Fut>(
    ctx: &SweepContext,
    ids: &[i64],
    mut process: F,
) -> PhaseReport
where
    F: FnMut(Vec<i64>) -> Fut,
    Fut: Future<Output = PhaseReport>,
{
    let mut report = PhaseReport::default();
    for chunk in ids.chunks(ctx.config.chunk_size.max(1)) {
        if ctx.gate.is_busy().await {
            report.interrupted = true;
            break;
        }
        report.merge(process(chunk.to_vec()).await);
    }
    report
}

/// Report for one bulk delete of `ids`
pub(crate) fn bulk_outcome(
    phase: &'static str,
    ids: &[i64],
    result: DispatcherResult<usize>,
) -> PhaseReport {
    match result {
        Ok(deleted) => PhaseReport {
            deleted,
            ..PhaseReport::default()
        },
        Err(e) => {
            warn!(phase, ids = ?ids, error = %e, "Chunk delete failed, leaving ids for a later sweep");
            PhaseReport {
                failed: ids.len(),
                ..PhaseReport::default()
            }
        }
    }
}

/// Report for one single-row delete of `id`
pub(crate) fn single_outcome(
    phase: &'static str,
    id: i64,
    result: DispatcherResult<bool>,
) -> PhaseReport {
    match result {
        Ok(deleted) => PhaseReport {
            deleted: usize::from(deleted),
            ..PhaseReport::default()
        },
        Err(e) => {
            warn!(phase, id, error = %e, "Delete failed, leaving row for a later sweep");
            PhaseReport {
                failed: 1,
                ..PhaseReport::default()
            }
        }
    }
}
