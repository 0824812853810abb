//! # Keyed Lock Registry
//!
//! Hands out one async read/write lock per key so mutations of the same entity id
//! serialize while different ids proceed independently.
//!
//! ## Identity
//!
//! Every caller that obtains the lock for a key receives a clone of the same
//! `Arc<RwLock<()>>` for as long as anyone still references it. The bookkeeping map
//! is guarded by a single mutex held only to look up, insert, touch or evict an
//! entry; it is never held across an `.await`.
//!
//! ## Eviction
//!
//! The map is bounded. An entry becomes evictable when it is idle longer than the
//! configured timeout, or when the map is over capacity (oldest first). In both
//! cases an entry is only removed while its `Arc` strong count is one, i.e. the
//! registry holds the last reference and no guard or pending acquisition exists.
//! New references are only handed out under the same mutex, so the check cannot
//! race with a concurrent acquisition. Over-capacity is therefore a soft limit:
//! when every entry is held the map grows until holders release.
//!
//! Guards are not reentrant. Acquiring a write guard for a key while the current
//! task already holds one for the same key deadlocks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, trace};

use crate::config::LockRegistryConfig;

/// How often idle entries are purged when the map is within capacity
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

struct LockEntry {
    lock: Arc<RwLock<()>>,
    last_access: Instant,
}

struct Entries<K> {
    map: HashMap<K, LockEntry>,
    last_purge: Instant,
}

/// Registry of per-key read/write locks with reference-counted eviction
pub struct KeyedLockRegistry<K> {
    name: &'static str,
    capacity: usize,
    idle_timeout: Duration,
    entries: Mutex<Entries<K>>,
}

impl<K> std::fmt::Debug for KeyedLockRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedLockRegistry")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("idle_timeout", &self.idle_timeout)
            .field("len", &self.entries.lock().map.len())
            .finish()
    }
}

impl<K> KeyedLockRegistry<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new(name: &'static str, capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            name,
            capacity,
            idle_timeout,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                last_purge: Instant::now(),
            }),
        }
    }

    pub fn from_config(name: &'static str, config: &LockRegistryConfig) -> Self {
        Self::new(name, config.capacity, config.idle_timeout())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of tracked keys, held or idle
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The lock scoped to `key`.
    ///
    /// Returns the same instance to every caller while at least one of them still
    /// holds it.
    pub fn lock_for(&self, key: &K) -> Arc<RwLock<()>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let lock = match entries.map.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                Arc::clone(&entry.lock)
            }
            None => {
                let lock = Arc::new(RwLock::new(()));
                entries.map.insert(
                    key.clone(),
                    LockEntry {
                        lock: Arc::clone(&lock),
                        last_access: now,
                    },
                );
                lock
            }
        };

        // The clone above keeps this key's entry alive through eviction
        self.evict(&mut entries, now);
        lock
    }

    /// Exclusive guard for `key`, released on drop
    pub async fn write_lock(&self, key: &K) -> OwnedRwLockWriteGuard<()> {
        let lock = self.lock_for(key);
        trace!(registry = self.name, key = ?key, "Acquiring write lock");
        lock.write_owned().await
    }

    /// Shared guard for `key`, released on drop
    pub async fn read_lock(&self, key: &K) -> OwnedRwLockReadGuard<()> {
        let lock = self.lock_for(key);
        trace!(registry = self.name, key = ?key, "Acquiring read lock");
        lock.read_owned().await
    }

    /// Run `operation` while holding the write lock for `key`.
    ///
    /// The guard is released on every exit path, including errors returned by
    /// `operation` and panics unwinding through it.
    pub async fn with_write_lock<F, Fut, T>(&self, key: &K, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.write_lock(key).await;
        operation().await
    }

    /// Run `operation` while holding the read lock for `key`
    pub async fn with_read_lock<F, Fut, T>(&self, key: &K, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.read_lock(key).await;
        operation().await
    }

    fn evict(&self, entries: &mut Entries<K>, now: Instant) {
        let over_capacity = entries.map.len() > self.capacity;
        if !over_capacity && now.duration_since(entries.last_purge) < PURGE_INTERVAL {
            return;
        }
        entries.last_purge = now;

        let before = entries.map.len();
        let idle_timeout = self.idle_timeout;
        entries.map.retain(|_, entry| {
            Arc::strong_count(&entry.lock) > 1
                || now.duration_since(entry.last_access) < idle_timeout
        });

        if entries.map.len() > self.capacity {
            let mut unreferenced: Vec<(K, Instant)> = entries
                .map
                .iter()
                .filter(|(_, entry)| Arc::strong_count(&entry.lock) == 1)
                .map(|(key, entry)| (key.clone(), entry.last_access))
                .collect();
            unreferenced.sort_by_key(|(_, last_access)| *last_access);

            let excess = entries.map.len() - self.capacity;
            for (key, _) in unreferenced.into_iter().take(excess) {
                entries.map.remove(&key);
            }
        }

        let evicted = before - entries.map.len();
        if evicted > 0 {
            debug!(
                registry = self.name,
                evicted = evicted,
                remaining = entries.map.len(),
                "Evicted idle keyed locks"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_key_same_lock_while_referenced() {
        let registry = KeyedLockRegistry::new("test", 10, Duration::from_secs(3600));
        let a = registry.lock_for(&42_i64);
        let b = registry.lock_for(&42_i64);
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.lock_for(&43_i64);
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_held_entries_survive_capacity_pressure() {
        let registry = KeyedLockRegistry::new("test", 1, Duration::ZERO);
        let held = registry.lock_for(&1_i64);
        for key in 2..50_i64 {
            let _ = registry.lock_for(&key);
        }
        let again = registry.lock_for(&1_i64);
        assert!(Arc::ptr_eq(&held, &again));
    }

    #[test]
    fn test_unreferenced_entries_are_evicted_over_capacity() {
        let registry = KeyedLockRegistry::new("test", 2, Duration::from_secs(3600));
        for key in 0..10_i64 {
            let _ = registry.lock_for(&key);
        }
        assert!(registry.len() <= 2);
    }

    #[tokio::test]
    async fn test_write_lock_excludes_readers() {
        let registry = Arc::new(KeyedLockRegistry::new("test", 10, Duration::from_secs(60)));
        let guard = registry.write_lock(&7_i64).await;

        let lock = registry.lock_for(&7_i64);
        assert!(lock.try_read().is_err());
        drop(guard);
        assert!(lock.try_read().is_ok());
    }

    #[tokio::test]
    async fn test_readers_are_compatible() {
        let registry = KeyedLockRegistry::new("test", 10, Duration::from_secs(60));
        let first = registry.read_lock(&7_i64).await;
        let second = registry.read_lock(&7_i64).await;
        assert!(registry.lock_for(&7_i64).try_write().is_err());
        drop(first);
        drop(second);
        assert!(registry.lock_for(&7_i64).try_write().is_ok());
    }

    #[tokio::test]
    async fn test_scoped_helper_releases_on_error() {
        let registry = KeyedLockRegistry::new("test", 10, Duration::from_secs(60));
        let result: Result<(), &str> = registry
            .with_write_lock(&1_i64, || async { Err("boom") })
            .await;
        assert!(result.is_err());
        assert!(registry.lock_for(&1_i64).try_write().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mutual_exclusion_under_eviction_pressure() {
        // Tiny capacity and zero idle timeout evict on nearly every lookup
        let registry = Arc::new(KeyedLockRegistry::new("stress", 2, Duration::ZERO));
        let holders = Arc::new(AtomicUsize::new(0));
        let max_holders = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            let holders = Arc::clone(&holders);
            let max_holders = Arc::clone(&max_holders);
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let _guard = registry.write_lock(&42_i64).await;
                    let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                    max_holders.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    holders.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for worker in 0..8_i64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                for key in 0..200_i64 {
                    let _guard = registry.write_lock(&(1_000 + worker * 1_000 + key)).await;
                }
            }));
        }

        for joined in futures::future::join_all(handles).await {
            joined.unwrap();
        }
        assert_eq!(max_holders.load(Ordering::SeqCst), 1);
    }
}
