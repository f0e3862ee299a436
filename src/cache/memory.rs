//! In-process cache backend.
//!
//! One LRU per bin, each behind its own mutex, so readers of different record
//! types never contend. Entries expire after the TTL of their category.

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use relsql_core::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::{CacheBackend, CacheCategory, CacheValue};
use crate::config::CacheConfig;

/// A cached value with its expiry
struct CacheEntry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

pub struct MemoryCache {
    bins: DashMap<String, Mutex<LruCache<Vec<Value>, CacheEntry>>>,
    capacity: NonZeroUsize,
    record_ttl: Option<Duration>,
    short_ttl: Option<Duration>,
    long_ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    shut_down: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub bins: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

fn ttl(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl MemoryCache {
    pub fn new(max_entries_per_bin: usize) -> Self {
        Self::with_config(&CacheConfig {
            max_entries_per_bin,
            ..CacheConfig::default()
        })
    }

    pub fn with_config(config: &CacheConfig) -> Self {
        Self {
            bins: DashMap::new(),
            capacity: NonZeroUsize::new(config.max_entries_per_bin).unwrap_or(NonZeroUsize::MIN),
            record_ttl: ttl(config.record_ttl_secs),
            short_ttl: ttl(config.short_ttl_secs),
            long_ttl: ttl(config.long_ttl_secs),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    fn ttl_for(&self, category: CacheCategory) -> Option<Duration> {
        match category {
            CacheCategory::Record | CacheCategory::WholeResult => self.record_ttl,
            CacheCategory::ShortTtlKeys => self.short_ttl,
            CacheCategory::LongTtlKeys => self.long_ttl,
        }
    }

    pub fn stats(&self) -> MemoryCacheStats {
        MemoryCacheStats {
            bins: self.bins.len(),
            entries: self.bins.iter().map(|bin| bin.lock().len()).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry, keeping counters
    pub fn clear(&self) {
        self.bins.clear();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_config(&CacheConfig::default())
    }
}

impl CacheBackend for MemoryCache {
    fn lookup(&self, bin: &str, key: &[Value]) -> Option<CacheValue> {
        let key = key.to_vec();
        let found = self.bins.get(bin).and_then(|entries| {
            let mut entries = entries.lock();
            let expired = entries.peek(&key)?.is_expired(Instant::now());
            if expired {
                entries.pop(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            entries.get(&key).map(|entry| entry.value.clone())
        });

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    fn store(&self, category: CacheCategory, bin: &str, key: Vec<Value>, value: CacheValue) {
        if self.shut_down.load(Ordering::Relaxed) {
            return;
        }
        let expires_at = self.ttl_for(category).map(|ttl| Instant::now() + ttl);
        let bin = self
            .bins
            .entry(bin.to_string())
            .or_insert_with(|| Mutex::new(LruCache::new(self.capacity)));
        let mut entries = bin.lock();
        if entries.len() >= self.capacity.get() && !entries.contains(&key) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.put(key, CacheEntry { value, expires_at });
    }

    fn remove(&self, bin: &str, key: &[Value]) {
        if let Some(entries) = self.bins.get(bin) {
            entries.lock().pop(&key.to_vec());
        }
    }

    fn enumerate(&self, bin: &str) -> Vec<Vec<Value>> {
        let now = Instant::now();
        self.bins
            .get(bin)
            .map(|entries| {
                entries
                    .lock()
                    .iter()
                    .filter(|(_, entry)| !entry.is_expired(now))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Relaxed);
        let stats = self.stats();
        self.bins.clear();
        tracing::info!(
            "[CACHE] Shut down: {} bins, {} entries dropped ({} hits, {} misses)",
            stats.bins,
            stats.entries,
            stats.hits,
            stats.misses
        );
    }
}
