//! Memoizing cache for asynchronous lookups.
//!
//! Each key holds one shared cell. The first `fetch` for a key runs the
//! producer; concurrent callers for the same key wait on that same cell
//! instead of starting their own lookup.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OnceCell};

use crate::infrastructure::ports::ClockPort;

/// Async key to value cache with optional expiry.
///
/// Expired entries are swept on the next `fetch`, not by a timer. An entry
/// whose producer is still running is never swept. A producer that fails
/// leaves nothing behind, so the next `fetch` retries.
pub struct FetchCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    timeout: Option<chrono::Duration>,
    clock: Arc<dyn ClockPort>,
}

struct CacheEntry<V> {
    cell: Arc<OnceCell<V>>,
    expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Create a cache. `None` disables expiry entirely.
    pub fn new(timeout: Option<Duration>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout: timeout.and_then(|t| chrono::Duration::from_std(t).ok()),
            clock,
        }
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.timeout.map(|t| now + t)
    }

    /// Return the cached value for `key`, or run `producer` to compute it.
    ///
    /// Every call extends the entry's expiry.
    pub async fn fetch<F, Fut, E>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let now = self.clock.now();
        let cell = {
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|_, e| !(e.cell.initialized() && e.is_expired(now)));
            let swept = before - entries.len();
            if swept > 0 {
                tracing::debug!(swept, "Swept expired cache entries");
            }

            let expires_at = self.expiry_from(now);
            let entry = entries.entry(key.clone()).or_insert_with(|| CacheEntry {
                cell: Arc::new(OnceCell::new()),
                expires_at,
            });
            entry.expires_at = expires_at;
            entry.cell.clone()
        };

        let producer_key = key.clone();
        let result = cell
            .get_or_try_init(move || producer(producer_key))
            .await
            .cloned();

        if result.is_err() {
            let mut entries = self.entries.lock().await;
            let stale = entries
                .get(&key)
                .is_some_and(|e| Arc::ptr_eq(&e.cell, &cell) && !e.cell.initialized());
            if stale {
                entries.remove(&key);
            }
        }

        result
    }

    /// Return the value only if it is already resolved and unexpired.
    ///
    /// Never runs a producer and never creates an entry. A hit extends expiry.
    pub async fn soft_fetch(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(key)?;
        if entry.is_expired(now) {
            return None;
        }
        let value = entry.cell.get().cloned()?;
        entry.expires_at = self.expiry_from(now);
        Some(value)
    }

    /// Evict one key. Returns whether an entry existed.
    pub async fn flush(&self, key: &K) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }

    pub async fn flush_all(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of entries, pending and expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
