//! TTL key-value store.
//!
//! # Responsibilities
//! - Store successful responses with a per-entry expiry
//! - Invalidate single keys or whole prefixes
//! - Track hit/miss/expiry counters for the metrics sink

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Counters exposed through the admin surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub invalidated: u64,
}

/// Concurrent TTL cache.
pub struct CacheStore<V> {
    entries: DashMap<String, Entry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    invalidated: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
        }
    }

    /// Look up a key. Expired entries are removed on the spot and count as
    /// misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(true);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.expired.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(false);
        None
    }

    /// Store a value with the given TTL. A zero TTL is a no-op.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove one key. Returns true if it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.invalidated.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove every key starting with `prefix`. Returns the count removed.
    ///
    /// Keys are `endpoint:method:path[:body]`, so an endpoint name or an
    /// `endpoint:GET:/path` prefix selects a whole class of entries.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        self.invalidated.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Drop every expired entry. Returns the count reclaimed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
        }
    }

    /// Periodic sweeper reclaiming entries nobody reads again.
    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Cache sweep reclaimed entries");
                    }
                    metrics::record_cache_size(self.len());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
