//! Dispatcher Reclaimer Binary
//!
//! Runs the reclamation service against PostgreSQL until Ctrl-C.
//!
//! Configuration is read from `config/dispatcher` (override the directory with
//! `DISPATCHER_CONFIG_DIR`, the environment with `DISPATCHER_ENV`).

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use dispatcher_core::config::ConfigManager;
use dispatcher_core::database::{DatabaseConnection, DatabaseMigrations, PgEntityStore};
use dispatcher_core::logging::init_structured_logging;
use dispatcher_core::orchestration::{
    ActivityGate, ReclamationService, ReclamationSweep, SweepContext,
};
use dispatcher_core::services::{ExecContextCache, InternalFunctionRegistry, StoreQueueProbe};
use dispatcher_core::sync::LockRegistries;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config_dir = std::env::var("DISPATCHER_CONFIG_DIR").ok().map(PathBuf::from);
    let manager =
        ConfigManager::load_from_directory(config_dir).context("failed to load configuration")?;
    let config = manager.config();

    info!(environment = manager.environment(), "Starting dispatcher reclaimer");

    let connection = DatabaseConnection::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    DatabaseMigrations::run_all(connection.pool())
        .await
        .context("failed to run migrations")?;

    let store = Arc::new(PgEntityStore::new(connection.pool().clone()));
    let probe = Arc::new(StoreQueueProbe::new(store.clone()));
    let gate = Arc::new(ActivityGate::from_config(probe, &config.activity_gate));

    let ctx = SweepContext::new(
        store,
        gate,
        Arc::new(LockRegistries::new(&config.lock_registry)),
        Arc::new(ExecContextCache::new()),
        Arc::new(InternalFunctionRegistry::new()),
        config.reclamation.clone(),
    );
    let service = ReclamationService::new(
        Arc::new(ReclamationSweep::new(ctx)),
        config.reclamation.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = tokio::spawn(async move { service.run(shutdown_rx).await });

    let joined = tokio::select! {
        joined = &mut handle => joined,
        signal = signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            handle.await
        }
    };
    connection.close().await;

    let outcome = joined.context("reclamation task panicked")?;
    if let Err(e) = &outcome {
        error!(error = %e, "Reclamation service stopped with an error");
    }
    outcome?;
    info!("Dispatcher reclaimer stopped");
    Ok(())
}
