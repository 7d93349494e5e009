//! Time-to-live cache for read-mostly lookups, backed by `moka`.
//!
//! # Responsibility
//! - Memoize values for a bounded duration (dashboard counts).
//! - Let writers invalidate entries they made stale.
//!
//! # Invariants
//! - An entry is never served after its TTL elapsed.
//! - Loader failures are returned to the caller and never cached.
//! - A zero TTL disables caching; every lookup runs the loader.
//! - Clones share the same entries.

use moka::sync::Cache;
use std::hash::Hash;
use std::time::Duration;

/// Upper bound on live entries per cache.
const DEFAULT_MAX_CAPACITY: u64 = 1_024;

/// Concurrent map of values that expire `ttl` after insertion.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    inner: Option<Cache<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY, ttl)
    }

    pub fn with_capacity(max_capacity: u64, ttl: Duration) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    /// Returns a live cached value, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.as_ref().and_then(|cache| cache.get(key))
    }

    pub fn insert(&self, key: K, value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value);
        }
    }

    /// Returns the cached value or loads, stores and returns a fresh one.
    pub fn get_or_try_insert_with<F, E>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = loader()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        if let Some(cache) = &self.inner {
            cache.invalidate(key);
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}
