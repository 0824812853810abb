//! # Reclamation Sweep Integration Tests
//!
//! Full sweeps against the in-memory store: what each phase reclaims, what it
//! must leave alone, and how the sweep behaves under backpressure and failures.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{SweepHarness, SOURCE_CODE_ID};
use dispatcher_core::config::ReclamationConfig;
use dispatcher_core::constants::internal_functions;
use dispatcher_core::database::{tables, transaction, StoreOperation};
use dispatcher_core::error::{DispatcherError, DispatcherResult};
use dispatcher_core::models::{
    Batch, CacheProcess, CacheVariable, DispatcherEvent, ExecContext, FunctionData, Processor,
    ProcessorCore, SatelliteKind, SatelliteRef, Task,
};
use dispatcher_core::orchestration::reclamation::phases::{OrphanChild, OrphanChildPhase};
use dispatcher_core::orchestration::{ActivityGate, PhaseReport, ReclamationPhase, SweepContext};
use dispatcher_core::services::TaskQueueProbe;
use dispatcher_core::state_machine::{ExecContextState, TaskExecState};

fn position(journal: &[StoreOperation], table: &str) -> usize {
    journal
        .iter()
        .position(|op| op.is_delete() && op.table() == table)
        .unwrap_or_else(|| panic!("no delete recorded for {table}"))
}

fn satellite(id: i64, exec_context_id: i64, created_on: DateTime<Utc>) -> SatelliteRef {
    SatelliteRef {
        id,
        exec_context_id,
        created_on,
    }
}

#[tokio::test]
async fn test_orphan_tasks_of_removed_context_are_reclaimed_in_one_tick() {
    let h = SweepHarness::new();
    h.tasks(100, 5001..=5010);

    let first = h.sweep().run().await.unwrap();
    let tasks = first.phase("orphan_tasks").unwrap();
    assert_eq!(tasks.candidates, 1);
    assert_eq!(tasks.deleted, 10);
    assert_eq!(tasks.failed, 0);
    assert!(h.store.task_ids().is_empty());

    h.store.clear_journal();
    let second = h.sweep().run().await.unwrap();
    let tasks = second.phase("orphan_tasks").unwrap();
    assert_eq!(tasks.candidates, 0);
    assert_eq!(tasks.deleted, 0);
    assert_eq!(h.store.deletions(), 0);
}

#[tokio::test]
async fn test_orphan_context_paged_across_many_pages() {
    let h = SweepHarness::new();
    h.tasks(100, 1..=250);
    h.variables(100, 1..=120);

    let report = h.sweep().run().await.unwrap();
    assert_eq!(report.phase("orphan_tasks").unwrap().deleted, 250);
    assert_eq!(report.phase("orphan_variables").unwrap().deleted, 120);
    assert!(h.store.task_ids().is_empty());
    assert!(h.store.variable_ids().is_empty());
}

#[tokio::test]
async fn test_live_context_children_are_kept() {
    let h = SweepHarness::new();
    h.live_context(1);
    h.tasks(1, 1..=5);
    h.variables(1, 1..=5);

    let report = h.sweep().run().await.unwrap();
    assert_eq!(report.total_deleted(), 0);
    assert_eq!(h.store.task_ids().len(), 5);
    assert_eq!(h.store.variable_ids().len(), 5);
}

#[tokio::test]
async fn test_orphan_context_subtree_deleted_parent_first() {
    let h = SweepHarness::new();
    let now = Utc::now();
    h.store
        .insert_exec_context(ExecContext::new(1, SOURCE_CODE_ID).with_root(999));
    h.cache.insert(ExecContext::new(1, SOURCE_CODE_ID).with_root(999));
    h.tasks(1, [10, 11]);
    h.variables(1, [20]);
    h.store.insert_satellite(
        SatelliteKind::Graph,
        satellite(30, 1, now - Duration::hours(2)),
    );

    let report = h.sweep().run_at(now).await.unwrap();
    assert_eq!(report.phase("orphan_exec_contexts").unwrap().deleted, 1);
    assert!(!h.cache.contains(1), "deleted context must leave the cache");

    let journal = h.store.journal();
    let context = position(&journal, tables::EXEC_CONTEXT);
    let task = position(&journal, tables::TASK);
    let variable = position(&journal, tables::VARIABLE);
    let graph = position(&journal, tables::EXEC_CONTEXT_GRAPH);
    assert!(context < task);
    assert!(task < variable);
    assert!(variable < graph);
    assert!(h.store.task_ids().is_empty());
    assert!(h.store.satellite_ids(SatelliteKind::Graph).is_empty());
}

#[tokio::test]
async fn test_context_without_source_code_is_orphaned() {
    let h = SweepHarness::new();
    h.live_context(1);
    h.store.insert_exec_context(ExecContext::new(2, 42));

    let report = h.sweep().run().await.unwrap();
    assert_eq!(report.phase("orphan_exec_contexts").unwrap().deleted, 1);
    assert_eq!(h.store.exec_context_ids(), vec![1]);
}

#[tokio::test]
async fn test_nested_orphans_reclaimed_one_level_per_tick() {
    let h = SweepHarness::new();
    h.store.insert_exec_context(ExecContext::new(1, 42));
    h.store
        .insert_exec_context(ExecContext::new(2, SOURCE_CODE_ID).with_root(1));
    h.store
        .insert_exec_context(ExecContext::new(3, SOURCE_CODE_ID).with_root(2));

    h.sweep().run().await.unwrap();
    assert_eq!(h.store.exec_context_ids(), vec![2, 3]);
    h.sweep().run().await.unwrap();
    assert_eq!(h.store.exec_context_ids(), vec![3]);
    h.sweep().run().await.unwrap();
    assert!(h.store.exec_context_ids().is_empty());
}

#[tokio::test]
async fn test_lost_tasks_of_finished_context_marked_completed() {
    let h = SweepHarness::new();
    h.store.insert_exec_context(
        ExecContext::new(10, SOURCE_CODE_ID).with_state(ExecContextState::Finished),
    );
    h.store.insert_exec_context(
        ExecContext::new(11, SOURCE_CODE_ID).with_state(ExecContextState::Started),
    );
    h.store.insert_task(Task::new(1, 10));
    h.store
        .insert_task(Task::new(2, 10).with_state(TaskExecState::InProgress));
    h.store.insert_task(Task::new(3, 10).with_state(TaskExecState::Ok));
    h.store.insert_task(Task::new(4, 11));

    let report = h.sweep().run().await.unwrap();
    let lost = report.phase("lost_tasks").unwrap();
    assert_eq!(lost.candidates, 1);
    assert_eq!(lost.corrected, 2);
    assert_eq!(lost.deleted, 0);
    assert_eq!(report.total_corrected(), 2);
    assert_eq!(report.total_deleted(), 0, "corrections are not deletions");

    let first = h.store.task(1).unwrap();
    assert!(first.completed);
    assert_eq!(first.exec_state, TaskExecState::None);
    let second = h.store.task(2).unwrap();
    assert!(second.completed);
    assert_eq!(second.exec_state, TaskExecState::InProgress);
    assert!(!h.store.task(4).unwrap().completed);
    assert_eq!(h.store.task_ids().len(), 4, "crash recovery deletes nothing");
}

#[tokio::test]
async fn test_busy_gate_defers_low_priority_phases() {
    let h = SweepHarness::new();
    h.store.insert_exec_context(ExecContext::new(1, 42));
    h.tasks(100, 1..=3);

    h.gate.set_busy();
    let report = h.sweep().run().await.unwrap();
    assert!(report.deferred);
    assert_eq!(
        report.phase_names(),
        vec!["orphan_exec_contexts", "lost_tasks"]
    );
    assert!(h.store.exec_context_ids().is_empty(), "ungated phase still runs");
    assert_eq!(h.store.task_ids().len(), 3);

    h.gate.not_busy();
    let report = h.sweep().run().await.unwrap();
    assert!(!report.deferred);
    assert_eq!(report.phases.len(), 10);
    assert!(h.store.task_ids().is_empty());
}

#[tokio::test]
async fn test_busy_guard_releases_gate_on_drop() {
    let h = SweepHarness::new();
    h.tasks(100, 1..=3);

    let guard = h.gate.enter();
    assert!(h.sweep().run().await.unwrap().deferred);
    drop(guard);

    assert!(!h.sweep().run().await.unwrap().deferred);
    assert!(h.store.task_ids().is_empty());
}

/// Reports an empty queue for the first `idle_samples` samples, then queued work
struct FlippingProbe {
    samples: AtomicUsize,
    idle_samples: usize,
}

#[async_trait]
impl TaskQueueProbe for FlippingProbe {
    async fn is_queue_empty_with_sync(&self) -> DispatcherResult<bool> {
        Ok(self.samples.fetch_add(1, Ordering::SeqCst) < self.idle_samples)
    }
}

#[tokio::test]
async fn test_gate_turning_busy_interrupts_phase_between_chunks() {
    let probe = Arc::new(FlippingProbe {
        samples: AtomicUsize::new(0),
        // sweep check, then two chunks
        idle_samples: 3,
    });
    let gate = Arc::new(ActivityGate::with_probe(probe, std::time::Duration::ZERO));
    let h = SweepHarness::with_gate(ReclamationConfig::default(), gate);
    h.tasks(100, 1..=25);

    let sweep = h.sweep_with(vec![Box::new(OrphanChildPhase::new(OrphanChild::Task))]);
    let report = sweep.run().await.unwrap();

    let tasks = report.phase("orphan_tasks").unwrap();
    assert!(tasks.interrupted);
    assert_eq!(tasks.status(), "interrupted");
    assert_eq!(tasks.deleted, 20);
    assert!(report.deferred);
    assert_eq!(h.store.task_ids().len(), 5);
}

#[tokio::test]
async fn test_cached_context_vetoes_child_cleanup() {
    let h = SweepHarness::new();
    h.cache.insert(ExecContext::new(100, SOURCE_CODE_ID));
    h.tasks(100, 1..=3);

    let report = h.sweep().run().await.unwrap();
    let tasks = report.phase("orphan_tasks").unwrap();
    assert_eq!(tasks.candidates, 1);
    assert_eq!(tasks.skipped, 1);
    assert_eq!(h.store.task_ids().len(), 3);

    h.cache.invalidate(100);
    h.sweep().run().await.unwrap();
    assert!(h.store.task_ids().is_empty());
}

#[tokio::test]
async fn test_context_reappearing_after_snapshot_is_skipped() {
    let h = SweepHarness::new();
    h.live_context(200);
    h.store.hide_from_listing(200);
    h.tasks(200, 1..=3);
    h.variables(200, 1..=2);

    let report = h.sweep().run().await.unwrap();
    assert_eq!(report.phase("orphan_tasks").unwrap().skipped, 1);
    assert_eq!(report.phase("orphan_variables").unwrap().skipped, 1);
    assert_eq!(h.store.task_ids().len(), 3);
    assert_eq!(h.store.variable_ids().len(), 2);
}

#[tokio::test]
async fn test_batch_retention() {
    let h = SweepHarness::new();
    let now = Utc::now();
    h.live_context(1);
    h.store.insert_company(7);
    h.store.insert_batch(Batch::new(1, 1, 7));
    h.store
        .insert_batch(Batch::new(2, 1, 7).created_at(now - Duration::days(2)).mark_deleted());
    h.store
        .insert_batch(Batch::new(3, 1, 7).created_at(now - Duration::hours(1)).mark_deleted());
    h.store.insert_batch(Batch::new(4, 1, 8));
    h.store.insert_batch(Batch::new(5, 999, 7));

    let report = h.sweep().run_at(now).await.unwrap();
    let batches = report.phase("batches").unwrap();
    assert_eq!(batches.candidates, 3);
    assert_eq!(batches.deleted, 3);
    assert_eq!(h.store.batch_ids(), vec![1, 3]);
}

#[tokio::test]
async fn test_cache_entries_of_unknown_functions_removed_with_payloads() {
    let h = SweepHarness::new();
    h.store.insert_function("fn.registered");
    h.store
        .insert_cache_process(CacheProcess::new(1, "fn.registered", "k1"), vec![]);
    h.store.insert_cache_process(
        CacheProcess::new(2, "fn.gone", "k2"),
        vec![
            CacheVariable {
                id: 10,
                cache_process_id: 2,
                variable_name: "out".to_string(),
                data: Some(vec![1, 2, 3]),
            },
            CacheVariable {
                id: 11,
                cache_process_id: 2,
                variable_name: "log".to_string(),
                data: None,
            },
        ],
    );
    h.store
        .insert_cache_process(CacheProcess::new(3, internal_functions::API_CALL, "k3"), vec![]);
    h.store
        .insert_cache_process(CacheProcess::new(4, internal_functions::NOP, "k4"), vec![]);

    let report = h.sweep().run().await.unwrap();
    let cache = report.phase("cache_entries").unwrap();
    assert_eq!(cache.candidates, 2);
    assert_eq!(cache.deleted, 2);
    assert_eq!(h.store.cache_process_ids(), vec![1, 3]);
    assert!(h.store.cache_variable_ids().is_empty());
}

#[tokio::test]
async fn test_dispatcher_events_past_retention_deleted() {
    let h = SweepHarness::new();
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
    let at = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
    h.store.insert_event(DispatcherEvent::new(1, at(2025, 1, 5), "old"));
    h.store.insert_event(DispatcherEvent::new(2, at(2026, 7, 31), "cutoff"));
    h.store.insert_event(DispatcherEvent::new(3, at(2026, 8, 1), "kept"));
    h.store.insert_event(DispatcherEvent::new(4, at(2026, 10, 17), "recent"));

    let report = h.sweep().run_at(now).await.unwrap();
    assert_eq!(report.phase("dispatcher_events").unwrap().deleted, 2);
    assert_eq!(h.store.event_ids(), vec![3, 4]);
}

#[tokio::test]
async fn test_function_data_of_unregistered_functions_deleted() {
    let h = SweepHarness::new();
    h.store.insert_function("fn.live");
    h.store
        .insert_function_data(FunctionData::new(1, "fn.live", vec![0]));
    h.store
        .insert_function_data(FunctionData::new(2, "fn.gone", vec![1]));
    h.store
        .insert_function_data(FunctionData::new(3, "fn.gone", vec![2]));

    let report = h.sweep().run().await.unwrap();
    let data = report.phase("function_data").unwrap();
    assert_eq!(data.candidates, 1);
    assert_eq!(data.deleted, 2);
    assert_eq!(h.store.function_data_codes(), vec!["fn.live".to_string()]);
}

#[tokio::test]
async fn test_cores_of_missing_processors_deleted_after_recheck() {
    let h = SweepHarness::new();
    h.store.insert_processor(Processor::new(1));
    h.store.insert_processor_core(ProcessorCore::new(1, 1, "c1"));
    h.store.insert_processor_core(ProcessorCore::new(2, 1, "c2"));
    h.store.insert_processor_core(ProcessorCore::new(3, 2, "c1"));
    h.store.insert_processor_core(ProcessorCore::new(4, 2, "c2"));
    // listed as missing in the snapshot, back by the time of the re-check
    h.store.insert_processor(Processor::new(3));
    h.store.hide_processor_from_listing(3);
    h.store.insert_processor_core(ProcessorCore::new(5, 3, "c1"));

    let report = h.sweep().run().await.unwrap();
    let cores = report.phase("processor_cores").unwrap();
    assert_eq!(cores.candidates, 3);
    assert_eq!(cores.deleted, 2);
    assert_eq!(cores.skipped, 1);
    assert_eq!(h.store.processor_core_ids(), vec![1, 2, 5]);
}

#[tokio::test]
async fn test_satellites_respect_grace_windows() {
    let h = SweepHarness::new();
    let now = Utc::now();
    let two_hours_ago = now - Duration::hours(2);
    h.live_context(1);
    h.store
        .insert_satellite(SatelliteKind::Graph, satellite(1, 1, two_hours_ago));
    h.store
        .insert_satellite(SatelliteKind::Graph, satellite(2, 500, two_hours_ago));
    h.store
        .insert_satellite(SatelliteKind::Graph, satellite(3, 500, now));
    h.store
        .insert_satellite(SatelliteKind::TaskState, satellite(4, 500, two_hours_ago));
    h.store.insert_satellite(
        SatelliteKind::VariableState,
        satellite(5, 500, two_hours_ago),
    );

    let report = h.sweep().run_at(now).await.unwrap();
    assert_eq!(report.phase("satellites").unwrap().deleted, 2);
    assert_eq!(h.store.satellite_ids(SatelliteKind::Graph), vec![1, 3]);
    assert_eq!(h.store.satellite_ids(SatelliteKind::TaskState), vec![4]);
    assert!(h.store.satellite_ids(SatelliteKind::VariableState).is_empty());
}

#[tokio::test]
async fn test_oversized_grace_window_skips_satellite_kind() {
    let h = SweepHarness::with_config(ReclamationConfig {
        graph_grace_seconds: u64::MAX / 2,
        ..ReclamationConfig::default()
    });
    let now = Utc::now();
    let long_ago = now - Duration::days(30);
    h.store
        .insert_satellite(SatelliteKind::Graph, satellite(1, 500, long_ago));
    h.store.insert_satellite(
        SatelliteKind::VariableState,
        satellite(2, 500, long_ago),
    );
    h.tasks(500, 1..=2);

    let report = h.sweep().run_at(now).await.unwrap();
    let satellites = report.phase("satellites").unwrap();
    assert_eq!(satellites.status(), "completed");
    assert_eq!(satellites.deleted, 1);
    assert_eq!(h.store.satellite_ids(SatelliteKind::Graph), vec![1]);
    assert!(h.store.satellite_ids(SatelliteKind::VariableState).is_empty());
    assert!(h.store.task_ids().is_empty());
}

#[tokio::test]
async fn test_failed_chunk_is_isolated_and_retried_next_tick() {
    let h = SweepHarness::new();
    h.tasks(100, 5001..=5010);
    h.variables(100, 1..=3);
    h.store.fail_deletes_of(tables::TASK, 5003);

    let report = h.sweep().run().await.unwrap();
    let tasks = report.phase("orphan_tasks").unwrap();
    assert_eq!(tasks.failed, 10);
    assert_eq!(tasks.deleted, 0);
    assert_eq!(tasks.status(), "completed");
    assert_eq!(report.phase("orphan_variables").unwrap().deleted, 3);
    assert_eq!(h.store.task_ids().len(), 10);

    h.store.clear_failures();
    h.sweep().run().await.unwrap();
    assert!(h.store.task_ids().is_empty());
}

#[tokio::test]
async fn test_single_row_failure_does_not_block_siblings() {
    let h = SweepHarness::new();
    h.store.insert_batch(Batch::new(2, 999, 7));
    h.store.insert_batch(Batch::new(3, 999, 7));
    h.store.fail_deletes_of(tables::BATCH, 2);

    let report = h.sweep().run().await.unwrap();
    let batches = report.phase("batches").unwrap();
    assert_eq!(batches.deleted, 1);
    assert_eq!(batches.failed, 1);
    assert_eq!(h.store.batch_ids(), vec![2]);
}

struct FailingPhase;

#[async_trait]
impl ReclamationPhase for FailingPhase {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn run(&self, _ctx: &SweepContext, _now: DateTime<Utc>) -> DispatcherResult<PhaseReport> {
        Err(DispatcherError::DatabaseError("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_phase_error_does_not_stop_later_phases() {
    let h = SweepHarness::new();
    h.tasks(100, 1..=3);

    let sweep = h.sweep_with(vec![
        Box::new(FailingPhase),
        Box::new(OrphanChildPhase::new(OrphanChild::Task)),
    ]);
    let report = sweep.run().await.unwrap();

    let failing = report.phase("failing").unwrap();
    assert_eq!(failing.status(), "failed");
    assert!(failing.error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(report.phase("orphan_tasks").unwrap().deleted, 3);
}

#[tokio::test]
async fn test_absurd_event_retention_is_fatal() {
    let h = SweepHarness::with_config(ReclamationConfig {
        keep_events_in_db_days: 200_000,
        ..ReclamationConfig::default()
    });
    h.tasks(100, 1..=3);

    let err = h.sweep().run().await.unwrap_err();
    assert!(matches!(err, DispatcherError::ConfigurationError(_)));
    assert!(err.is_fatal());
    // earlier phases already committed their work
    assert!(h.store.task_ids().is_empty());
}

#[tokio::test]
async fn test_sweep_refuses_to_run_inside_transaction() {
    let h = SweepHarness::new();
    h.tasks(100, 1..=3);
    let sweep = h.sweep();

    let err = transaction::scope(async { sweep.run().await })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatcherError::InvalidState(_)));
    assert_eq!(h.store.task_ids().len(), 3);
}

#[tokio::test]
async fn test_repeated_sweeps_are_idempotent() {
    let h = SweepHarness::new();
    let now = Utc::now();
    h.live_context(1);
    h.tasks(1, 1..=4);
    h.store.insert_exec_context(ExecContext::new(2, 42));
    h.tasks(2, 10..=12);
    h.variables(3, 20..=25);
    h.store.insert_batch(Batch::new(1, 3, 7));
    h.store
        .insert_satellite(SatelliteKind::Graph, satellite(1, 3, now - Duration::days(1)));
    h.store.insert_processor_core(ProcessorCore::new(1, 9, "c1"));

    let first = h.sweep().run_at(now).await.unwrap();
    assert!(first.total_deleted() > 0);
    let remaining_tasks = h.store.task_ids();

    h.store.clear_journal();
    let second = h.sweep().run_at(now).await.unwrap();
    assert_eq!(second.total_deleted(), 0);
    assert_eq!(second.total_failed(), 0);
    assert_eq!(h.store.deletions(), 0);
    assert_eq!(h.store.task_ids(), remaining_tasks);
    assert_eq!(remaining_tasks, vec![1, 2, 3, 4]);
}
