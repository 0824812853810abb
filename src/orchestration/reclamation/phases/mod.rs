//! The individual reclamation phases, in sweep order.

mod batches;
mod cache_entries;
mod dispatcher_events;
mod exec_contexts;
mod function_data;
mod lost_tasks;
mod orphan_children;
mod processor_cores;
mod satellites;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::DispatcherResult;

use super::{PhaseReport, SweepContext};

pub use batches::BatchPhase;
pub use cache_entries::CacheEntryPhase;
pub use dispatcher_events::DispatcherEventPhase;
pub use exec_contexts::OrphanExecContextPhase;
pub use function_data::FunctionDataPhase;
pub use lost_tasks::LostTaskPhase;
pub use orphan_children::{OrphanChild, OrphanChildPhase};
pub use processor_cores::ProcessorCorePhase;
pub use satellites::SatellitePhase;

/// One step of the sweep with its own error boundary
#[async_trait]
pub trait ReclamationPhase: Send + Sync {
    /// Stable name used in logs, metrics and reports
    fn name(&self) -> &'static str;

    /// Whether the activity gate must be idle before this phase starts
    fn gated(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &SweepContext, now: DateTime<Utc>) -> DispatcherResult<PhaseReport>;
}

/// Every phase in execution order
pub fn default_phases() -> Vec<Box<dyn ReclamationPhase>> {
    vec![
        Box::new(OrphanExecContextPhase),
        Box::new(LostTaskPhase),
        Box::new(BatchPhase),
        Box::new(OrphanChildPhase::new(OrphanChild::Task)),
        Box::new(OrphanChildPhase::new(OrphanChild::Variable)),
        Box::new(CacheEntryPhase),
        Box::new(DispatcherEventPhase),
        Box::new(FunctionDataPhase),
        Box::new(ProcessorCorePhase),
        Box::new(SatellitePhase),
    ]
}

async fn live_exec_context_ids(ctx: &SweepContext) -> DispatcherResult<HashSet<i64>> {
    Ok(ctx
        .store
        .find_all_exec_context_ids()
        .await?
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_order() {
        let phases = default_phases();
        let names: Vec<_> = phases.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "orphan_exec_contexts",
                "lost_tasks",
                "batches",
                "orphan_tasks",
                "orphan_variables",
                "cache_entries",
                "dispatcher_events",
                "function_data",
                "processor_cores",
                "satellites",
            ]
        );
        let ungated: Vec<_> = phases
            .iter()
            .filter(|p| !p.gated())
            .map(|p| p.name())
            .collect();
        assert_eq!(ungated, vec!["orphan_exec_contexts", "lost_tasks"]);
    }
}
