#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatcher Core
//!
//! Dispatcher-side lifecycle reconciler for a distributed task-processing system.
//!
//! ## Overview
//!
//! A dispatcher schedules execution contexts, their tasks and variables onto a
//! fleet of processors. Each of those entities owns rows in several tables, and
//! crashes, cancellations and concurrent deletes regularly leave rows behind whose
//! parent is already gone. This crate reclaims them in the background while the
//! scheduling path keeps running.
//!
//! ## Architecture
//!
//! - **Keyed locks** ([`sync`]): one read/write lock per entity id, created on demand
//!   and evicted when idle, so deletes never race a concurrent mutation of the same
//!   aggregate
//! - **Activity gate** ([`orchestration::ActivityGate`]): a busy signal raised by
//!   the scheduling path; reclamation backs off while it is up
//! - **Reclamation sweep** ([`orchestration::ReclamationSweep`]): ordered phases,
//!   parents before children, each paged and chunked
//! - **Persistence contracts** ([`database`]): narrow repository traits with a
//!   PostgreSQL and an in-memory implementation
//!
//! ## Module Organization
//!
//! - [`config`] - TOML configuration with environment overlays
//! - [`constants`] - Limits, defaults and state groups
//! - [`database`] - Repository traits, stores, migrations and transaction tracking
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and reclamation log helpers
//! - [`metrics`] - OpenTelemetry counters for reclamation
//! - [`models`] - Entity records and projections
//! - [`orchestration`] - Activity gate, reclamation sweep and service
//! - [`services`] - Context cache, context/batch services, function registry, queue probe
//! - [`state_machine`] - Task and context states
//! - [`sync`] - Keyed lock registries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dispatcher_core::config::ConfigManager;
//! use dispatcher_core::database::MemoryStore;
//! use dispatcher_core::orchestration::{ActivityGate, ReclamationSweep, SweepContext};
//! use dispatcher_core::services::{ExecContextCache, InternalFunctionRegistry};
//! use dispatcher_core::sync::LockRegistries;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//!
//! let ctx = SweepContext::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ActivityGate::new()),
//!     Arc::new(LockRegistries::new(&config.lock_registry)),
//!     Arc::new(ExecContextCache::new()),
//!     Arc::new(InternalFunctionRegistry::new()),
//!     config.reclamation.clone(),
//! );
//! let report = ReclamationSweep::new(ctx).run().await?;
//! println!("reclaimed {} rows", report.total_deleted());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Every phase is exercised against [`database::MemoryStore`], which records a
//! journal of deletes and supports fault injection:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestration;
pub mod services;
pub mod state_machine;
pub mod sync;

pub use config::{
    ActivityGateConfig, ConfigManager, DatabaseConfig, DispatcherConfig, LockRegistryConfig,
    ReclamationConfig,
};
pub use constants::{status_groups, system};
pub use error::{DispatcherError, DispatcherResult};
pub use orchestration::{ActivityGate, ReclamationService, ReclamationSweep, SweepReport};
