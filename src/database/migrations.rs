//! # Database Migration System
//!
//! Schema migrations are embedded at compile time from `migrations/` and applied
//! with sqlx's migrator. Several dispatcher instances may start at once; the migrator
//! serializes them on a PostgreSQL advisory lock, so one instance applies and the
//! others find nothing outstanding.
//!
//! Migration files follow the `YYYYMMDDHHMMSS_description.sql` naming convention.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::error::DispatcherResult;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies embedded schema migrations
pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every outstanding migration
    pub async fn run_all(pool: &PgPool) -> DispatcherResult<()> {
        MIGRATOR.run(pool).await?;
        info!(
            migrations = MIGRATOR.iter().count(),
            "Database schema is up to date"
        );
        Ok(())
    }

    /// Versions of the embedded migrations, oldest first
    pub fn embedded_versions() -> Vec<i64> {
        MIGRATOR.iter().map(|m| m.version).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_are_ordered() {
        let versions = DatabaseMigrations::embedded_versions();
        assert!(!versions.is_empty());
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }
}
