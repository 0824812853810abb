//! # Keyed Locking
//!
//! Per-entity mutual exclusion without a global lock. Every mutation of an
//! aggregate root takes the matching write lock from [`LockRegistries`] before it
//! touches persisted state for that id.

pub mod keyed_lock;
pub mod registries;

pub use keyed_lock::KeyedLockRegistry;
pub use registries::LockRegistries;
