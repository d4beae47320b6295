// SPDX-License-Identifier: Apache-2.0

//! Metadata caching layer for catalog introspection results
//!
//! Entries are immutable once inserted and expire lazily: an expired entry is
//! only removed when a `get` trips over it (or on an explicit
//! [`MetadataCache::purge_expired`]). The key-to-entry map is sharded, so
//! operations on different keys do not contend on a single lock.

pub mod cursor;
pub mod key;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use self::cursor::{MemoryCursor, RowCursor, TableData};
use crate::config::MetadataCacheConfig;

/// Stored result plus its absolute expiry
#[derive(Debug)]
struct CacheEntry {
    data: Arc<TableData>,

    /// `None` when the TTL is too large to represent
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: Arc<TableData>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Thread-safe, TTL-bounded cache of tabular introspection results
pub struct MetadataCache {
    /// Entries keyed by `"<operation>:<dataset>:<name>"`
    entries: DashMap<String, Arc<CacheEntry>>,

    /// Cache configuration
    config: MetadataCacheConfig,

    /// Default TTL, kept separately for sub-second precision
    ttl: Duration,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// Create a new metadata cache
    pub fn new(config: MetadataCacheConfig) -> Self {
        debug!(
            "Creating metadata cache (enabled={}, ttl={}s)",
            config.enabled, config.ttl_seconds
        );
        Self {
            entries: DashMap::new(),
            ttl: config.ttl(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create an enabled cache with the given TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        let mut cache = Self::new(MetadataCacheConfig {
            enabled: true,
            ttl_seconds: ttl.as_secs(),
            ..Default::default()
        });
        cache.ttl = ttl;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Default TTL applied by [`MetadataCache::put`]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn config(&self) -> &MetadataCacheConfig {
        &self.config
    }

    /// Look up `key`, returning a fresh cursor over the stored result.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<MemoryCursor> {
        if !self.config.enabled {
            return None;
        }

        // Clone the entry out so the shard lock is released before any removal
        let entry = self.entries.get(key).map(|entry| Arc::clone(entry.value()));

        match entry {
            Some(entry) if entry.is_expired(Instant::now()) => {
                // Only remove the entry we looked at, not a newer replacement
                self.entries
                    .remove_if(key, |_, current| Arc::ptr_eq(current, &entry));
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("Cache entry expired: {}", key);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("Cache hit: {}", key);
                Some(MemoryCursor::from_shared(Arc::clone(&entry.data)))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("Cache miss: {}", key);
                None
            }
        }
    }

    /// Drain `source` and store its contents under `key` with the default TTL.
    ///
    /// A disabled cache leaves `source` untouched.
    pub fn put(&self, key: impl Into<String>, source: &mut dyn RowCursor) {
        self.put_with_ttl(key, source, self.ttl());
    }

    /// Drain `source` and store its contents under `key`, replacing any existing entry.
    ///
    /// A disabled cache leaves `source` untouched. A cursor whose rows do not
    /// match its column metadata is not cached.
    pub fn put_with_ttl(&self, key: impl Into<String>, source: &mut dyn RowCursor, ttl: Duration) {
        if !self.config.enabled {
            return;
        }
        let data = TableData::drain(source);
        self.insert(key.into(), Arc::new(data), ttl);
    }

    /// Store already materialized data; returns whether it was cached
    pub(crate) fn insert(&self, key: String, data: Arc<TableData>, ttl: Duration) -> bool {
        if !self.config.enabled {
            return false;
        }
        if let Err(reason) = data.validate() {
            warn!("Not caching incompatible result for {}: {}", key, reason);
            return false;
        }

        debug!("Caching {} rows under {}", data.rows.len(), key);
        self.entries.insert(key, Arc::new(CacheEntry::new(data, ttl)));
        true
    }

    /// Remove all entries
    pub fn clear(&self) {
        debug!("Clearing all metadata cache entries");
        self.entries.clear();
    }

    /// Remove every entry whose key starts with `prefix`, returning how many were removed
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!("Invalidated {} cache entries with prefix {}", removed, prefix);
        removed
    }

    /// Invalidate every table and column listing beneath `dataset`
    pub fn invalidate_dataset(&self, dataset: &str) -> usize {
        debug!("Invalidating cached metadata for dataset: {}", dataset);
        key::dataset_prefixes(dataset)
            .iter()
            .map(|prefix| self.invalidate(prefix))
            .sum()
    }

    /// Remove every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(now);
            if expired {
                removed += 1;
            }
            !expired
        });
        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet removed
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Get cache statistics without removing anything
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut entries = 0;
        let mut expired_entries = 0;
        for entry in self.entries.iter() {
            entries += 1;
            if entry.value().is_expired(now) {
                expired_entries += 1;
            }
        }
        CacheStats {
            entries,
            expired_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(MetadataCacheConfig::default())
    }
}

impl fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCache")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub expired_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Entries that are still valid
    pub fn live_entries(&self) -> usize {
        self.entries - self.expired_entries
    }

    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries ({} expired), {:.1}% hit rate",
            self.entries,
            self.expired_entries,
            self.hit_rate() * 100.0
        )
    }
}
