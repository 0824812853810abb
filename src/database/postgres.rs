//! # PostgreSQL Entity Store
//!
//! [`EntityStore`](super::EntityStore) over a `PgPool`. Queries are built at runtime
//! with `sqlx::query*` so the crate compiles without a live database.
//!
//! Every mutation runs in its own short transaction inside
//! [`transaction::scope`](super::transaction::scope); reads use the pool directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::repositories::{
    BatchRepository, CacheRepository, CompanyRepository, DispatcherEventRepository,
    ExecContextRepository, FunctionRepository, ProcessorRepository, SatelliteRepository,
    SourceCodeRepository, TaskRepository, VariableRepository,
};
use super::{tables, transaction};
use crate::error::{DispatcherError, DispatcherResult};
use crate::models::{
    Batch, CacheProcessRef, ExecContext, ExecContextRef, Processor, ProcessorCoreRef,
    SatelliteKind, SatelliteRef,
};
use crate::state_machine::{ExecContextState, TaskExecState};

#[derive(Debug, FromRow)]
struct ExecContextRow {
    id: i64,
    source_code_id: i64,
    root_exec_context_id: Option<i64>,
    state: i32,
    created_on: DateTime<Utc>,
}

impl TryFrom<ExecContextRow> for ExecContext {
    type Error = DispatcherError;

    fn try_from(row: ExecContextRow) -> Result<Self, Self::Error> {
        let state = ExecContextState::from_code(row.state).map_err(DispatcherError::DatabaseError)?;
        Ok(ExecContext {
            id: row.id,
            source_code_id: row.source_code_id,
            root_exec_context_id: row.root_exec_context_id,
            state,
            created_on: row.created_on,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProcessorRow {
    id: i64,
    ip: Option<String>,
    updated_on: DateTime<Utc>,
}

/// Store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn delete_by_id(&self, table: &'static str, id: i64) -> DispatcherResult<bool> {
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        transaction::scope(async {
            let mut tx = self.pool.begin().await?;
            let done = sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
            tx.commit().await?;
            Ok::<bool, DispatcherError>(done.rows_affected() > 0)
        })
        .await
    }

    async fn delete_by_ids(&self, table: &'static str, ids: &[i64]) -> DispatcherResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM {table} WHERE id = ANY($1)");
        transaction::scope(async {
            let mut tx = self.pool.begin().await?;
            let done = sqlx::query(&sql).bind(ids).execute(&mut *tx).await?;
            tx.commit().await?;
            Ok::<usize, DispatcherError>(done.rows_affected() as usize)
        })
        .await
    }

    async fn select_ids(&self, sql: &str) -> DispatcherResult<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(sql)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl ExecContextRepository for PgEntityStore {
    async fn find_all_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        self.select_ids("SELECT id FROM mh_exec_context").await
    }

    async fn find_all_exec_context_refs(&self) -> DispatcherResult<Vec<ExecContextRef>> {
        Ok(sqlx::query_as::<_, ExecContextRef>(
            r#"
            SELECT id, source_code_id, root_exec_context_id
            FROM mh_exec_context
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_exec_context_by_id(&self, id: i64) -> DispatcherResult<Option<ExecContext>> {
        let row = sqlx::query_as::<_, ExecContextRow>(
            r#"
            SELECT id, source_code_id, root_exec_context_id, state, created_on
            FROM mh_exec_context
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ExecContext::try_from).transpose()
    }

    async fn find_finished_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT id FROM mh_exec_context WHERE state IN ($1, $2)",
        )
        .bind(ExecContextState::Finished.code())
        .bind(ExecContextState::Error.code())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_exec_context(&self, id: i64) -> DispatcherResult<bool> {
        self.delete_by_id(tables::EXEC_CONTEXT, id).await
    }
}

#[async_trait]
impl SourceCodeRepository for PgEntityStore {
    async fn find_all_source_code_ids(&self) -> DispatcherResult<Vec<i64>> {
        self.select_ids("SELECT id FROM mh_source_code").await
    }
}

#[async_trait]
impl SatelliteRepository for PgEntityStore {
    async fn find_satellite_refs(&self, kind: SatelliteKind) -> DispatcherResult<Vec<SatelliteRef>> {
        let sql = format!(
            "SELECT id, exec_context_id, created_on FROM {}",
            kind.table_name()
        );
        Ok(sqlx::query_as::<_, SatelliteRef>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_satellite(&self, kind: SatelliteKind, id: i64) -> DispatcherResult<bool> {
        self.delete_by_id(kind.table_name(), id).await
    }
}

#[async_trait]
impl TaskRepository for PgEntityStore {
    async fn find_all_task_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        self.select_ids("SELECT DISTINCT exec_context_id FROM mh_task")
            .await
    }

    async fn find_task_ids_by_exec_context(
        &self,
        exec_context_id: i64,
        limit: usize,
    ) -> DispatcherResult<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT id FROM mh_task WHERE exec_context_id = $1 ORDER BY id LIMIT $2",
        )
        .bind(exec_context_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_tasks_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize> {
        self.delete_by_ids(tables::TASK, ids).await
    }

    async fn find_exec_context_ids_with_lost_tasks(&self) -> DispatcherResult<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT exec_context_id
            FROM mh_task
            WHERE completed = false AND exec_state IN ($1, $2)
            "#,
        )
        .bind(TaskExecState::None.code())
        .bind(TaskExecState::InProgress.code())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_lost_tasks_completed(&self, exec_context_id: i64) -> DispatcherResult<usize> {
        transaction::scope(async {
            let mut tx = self.pool.begin().await?;
            let done = sqlx::query(
                r#"
                UPDATE mh_task
                SET completed = true
                WHERE exec_context_id = $1 AND completed = false AND exec_state IN ($2, $3)
                "#,
            )
            .bind(exec_context_id)
            .bind(TaskExecState::None.code())
            .bind(TaskExecState::InProgress.code())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<usize, DispatcherError>(done.rows_affected() as usize)
        })
        .await
    }

    async fn has_runnable_tasks(&self) -> DispatcherResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM mh_task t
                JOIN mh_exec_context ec ON ec.id = t.exec_context_id
                WHERE t.completed = false AND t.exec_state = $1 AND ec.state = $2
            )
            "#,
        )
        .bind(TaskExecState::None.code())
        .bind(ExecContextState::Started.code())
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl VariableRepository for PgEntityStore {
    async fn find_all_variable_exec_context_ids(&self) -> DispatcherResult<Vec<i64>> {
        self.select_ids("SELECT DISTINCT exec_context_id FROM mh_variable")
            .await
    }

    async fn find_variable_ids_by_exec_context(
        &self,
        exec_context_id: i64,
        limit: usize,
    ) -> DispatcherResult<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT id FROM mh_variable WHERE exec_context_id = $1 ORDER BY id LIMIT $2",
        )
        .bind(exec_context_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_variables_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize> {
        self.delete_by_ids(tables::VARIABLE, ids).await
    }
}

#[async_trait]
impl CacheRepository for PgEntityStore {
    async fn find_all_cache_process_refs(&self) -> DispatcherResult<Vec<CacheProcessRef>> {
        Ok(sqlx::query_as::<_, CacheProcessRef>(
            "SELECT id, function_code FROM mh_cache_process",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_cache_process(&self, id: i64) -> DispatcherResult<bool> {
        transaction::scope(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM mh_cache_variable WHERE cache_process_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            let done = sqlx::query("DELETE FROM mh_cache_process WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<bool, DispatcherError>(done.rows_affected() > 0)
        })
        .await
    }
}

#[async_trait]
impl FunctionRepository for PgEntityStore {
    async fn find_all_function_codes(&self) -> DispatcherResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>("SELECT code FROM mh_function")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_all_function_data_codes(&self) -> DispatcherResult<Vec<String>> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT DISTINCT function_code FROM mh_function_data")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn delete_function_data_by_code(&self, function_code: &str) -> DispatcherResult<usize> {
        transaction::scope(async {
            let mut tx = self.pool.begin().await?;
            let done = sqlx::query("DELETE FROM mh_function_data WHERE function_code = $1")
                .bind(function_code)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<usize, DispatcherError>(done.rows_affected() as usize)
        })
        .await
    }
}

#[async_trait]
impl ProcessorRepository for PgEntityStore {
    async fn find_all_processor_ids(&self) -> DispatcherResult<Vec<i64>> {
        self.select_ids("SELECT id FROM mh_processor").await
    }

    async fn find_processor_by_id(&self, id: i64) -> DispatcherResult<Option<Processor>> {
        let row = sqlx::query_as::<_, ProcessorRow>(
            "SELECT id, ip, updated_on FROM mh_processor WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Processor {
            id: r.id,
            ip: r.ip,
            updated_on: r.updated_on,
        }))
    }

    async fn find_all_processor_core_refs(&self) -> DispatcherResult<Vec<ProcessorCoreRef>> {
        Ok(sqlx::query_as::<_, ProcessorCoreRef>(
            "SELECT id, processor_id FROM mh_processor_core",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_processor_cores_by_ids(&self, ids: &[i64]) -> DispatcherResult<usize> {
        self.delete_by_ids(tables::PROCESSOR_CORE, ids).await
    }
}

#[async_trait]
impl BatchRepository for PgEntityStore {
    async fn find_all_batches(&self) -> DispatcherResult<Vec<Batch>> {
        Ok(sqlx::query_as::<_, Batch>(
            r#"
            SELECT id, exec_context_id, company_id, deleted, created_on
            FROM mh_batch
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_batch_by_id(&self, id: i64) -> DispatcherResult<Option<Batch>> {
        Ok(sqlx::query_as::<_, Batch>(
            r#"
            SELECT id, exec_context_id, company_id, deleted, created_on
            FROM mh_batch
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_batch(&self, id: i64) -> DispatcherResult<bool> {
        self.delete_by_id(tables::BATCH, id).await
    }

    async fn mark_batch_deleted(&self, id: i64) -> DispatcherResult<bool> {
        transaction::scope(async {
            let mut tx = self.pool.begin().await?;
            let done = sqlx::query("UPDATE mh_batch SET deleted = true WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<bool, DispatcherError>(done.rows_affected() > 0)
        })
        .await
    }
}

#[async_trait]
impl CompanyRepository for PgEntityStore {
    async fn find_all_company_ids(&self) -> DispatcherResult<Vec<i64>> {
        self.select_ids("SELECT id FROM mh_company").await
    }
}

#[async_trait]
impl DispatcherEventRepository for PgEntityStore {
    async fn delete_events_with_period_le(&self, period: i32) -> DispatcherResult<u64> {
        transaction::scope(async {
            let mut tx = self.pool.begin().await?;
            let done = sqlx::query("DELETE FROM mh_dispatcher_event WHERE period <= $1")
                .bind(period)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<u64, DispatcherError>(done.rows_affected())
        })
        .await
    }
}
