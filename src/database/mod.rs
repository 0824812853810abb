//! # Database Operations
//!
//! Persistence layer of the dispatcher maintenance loop.
//!
//! ## Key Components
//!
//! - [`repositories`] - Narrow async repository traits and the [`EntityStore`] composition
//! - [`postgres`] - PostgreSQL implementation over a `PgPool`
//! - [`memory`] - In-memory implementation with an operation journal, used by tests
//! - [`transaction`] - Task-local "inside a transaction" marker
//! - [`connection`] - Pool construction from [`DatabaseConfig`](crate::config::DatabaseConfig)
//! - [`migrations`] - Embedded schema migrations
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dispatcher_core::config::DatabaseConfig;
//! use dispatcher_core::database::{DatabaseConnection, DatabaseMigrations, PgEntityStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseConnection::connect(&DatabaseConfig::default()).await?;
//! DatabaseMigrations::run_all(db.pool()).await?;
//! let store = PgEntityStore::new(db.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod postgres;
pub mod repositories;
pub mod tables;
pub mod transaction;

pub use connection::DatabaseConnection;
pub use memory::{MemoryStore, StoreOperation};
pub use migrations::DatabaseMigrations;
pub use postgres::PgEntityStore;
pub use repositories::{
    BatchRepository, CacheRepository, CompanyRepository, DispatcherEventRepository, EntityStore,
    ExecContextRepository, FunctionRepository, ProcessorRepository, SatelliteRepository,
    SourceCodeRepository, TaskRepository, VariableRepository,
};
