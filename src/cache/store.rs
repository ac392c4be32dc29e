//! TTL-bounded response cache.
//!
//! Entries expire lazily: an expired entry is removed by the first `get` or
//! `has` that sees it, or by a `cleanup` sweep. `set` runs that sweep when
//! the cache is full; it is not LRU and never drops live entries, so the
//! cache can grow past `max_entries` when nothing has expired.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use crate::logging::targets;
use crate::prelude::*;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    inserts: AtomicU64,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because they expired
    pub expired: u64,
    pub inserts: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// String-keyed cache with per-entry expiry and a soft size ceiling.
#[derive(Debug)]
pub struct ResponseCache<V> {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    counters: CacheCounters,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            entries: Mutex::new(HashMap::new()),
            counters: CacheCounters::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Live value for `key`. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries();

        let value = match entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(true) => {
                entries.remove(key);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(false) => entries.get(key).map(|entry| entry.value.clone()),
            None => None,
        };

        let counter = if value.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Store `value` for `ttl`, or the configured default TTL.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = Instant::now();
        let expires_at = now + ttl.unwrap_or_else(|| self.config.default_ttl());
        let mut entries = self.entries();

        if entries.len() >= self.config.max_entries && !entries.contains_key(&key) {
            let removed = self.sweep(&mut entries, now);
            if entries.len() >= self.config.max_entries {
                debug!(
                    target: targets::CACHE,
                    entries = entries.len(),
                    max_entries = self.config.max_entries,
                    removed,
                    "Cache full of live entries - growing past max_entries"
                );
            }
        }

        entries.insert(key, CacheEntry { value, expires_at });
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether `key` holds a live value. Removes it if expired.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries();
        match entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(true) => {
                entries.remove(key);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(false) => true,
            None => false,
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Remove every key starting with `prefix`. Returns how many were removed.
    pub fn delete_by_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries();
        self.sweep(&mut entries, Instant::now())
    }

    fn sweep(&self, entries: &mut HashMap<String, CacheEntry<V>>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            self.counters
                .expired
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(target: targets::CACHE, removed, remaining = entries.len(), "Swept expired entries");
        }
        removed
    }

    /// Cached value for `key`, or the result of `factory` (which is then stored).
    ///
    /// Concurrent misses on the same key each run their own factory.
    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Option<Duration>, factory: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = factory().await;
        self.set(key, value.clone(), ttl);
        value
    }

    /// [`get_or_set`](Self::get_or_set) for a fallible factory. Errors are
    /// returned as-is and nothing is cached.
    pub async fn try_get_or_set<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = factory().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
        }
    }
}
