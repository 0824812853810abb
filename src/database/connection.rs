use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::DispatcherResult;

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    pub async fn connect(config: &DatabaseConfig) -> DispatcherResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Database pool established"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> DispatcherResult<bool> {
        let health: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
