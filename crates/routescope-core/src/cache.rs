//! Compiled-query cache.
//!
//! Compiled queries are reused across calls as long as the logical query
//! and the capability snapshot it was validated against are unchanged.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use routescope_proto::{CompiledQuery, ExecutionContext};

/// Default number of cached compiled queries.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Cache key: the query hash plus the context flags that affect validity.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CacheKey {
    pub hash: String,
    pub spatial_ready: bool,
    pub has_point: bool,
    pub has_boundary: bool,
}

impl CacheKey {
    /// Build a key for a query hash under a context.
    pub fn new(hash: impl Into<String>, ctx: &ExecutionContext) -> Self {
        Self {
            hash: hash.into(),
            spatial_ready: ctx.spatial_ready,
            has_point: ctx.has_point(),
            has_boundary: ctx.has_boundary(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(AtomicOrdering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(AtomicOrdering::Relaxed)
    }

    /// Get eviction count.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(AtomicOrdering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Arc<CompiledQuery>>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<CacheKey>,
}

/// Bounded cache with insertion-order eviction.
///
/// On overflow the oldest inserted entry is dropped; lookups do not
/// refresh an entry's position.
pub struct CompiledQueryCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    stats: CacheStats,
}

impl CompiledQueryCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Look up a compiled query.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CompiledQuery>> {
        let found = self.inner.lock().entries.get(key).cloned();
        match &found {
            Some(_) => self.stats.hits.fetch_add(1, AtomicOrdering::Relaxed),
            None => self.stats.misses.fetch_add(1, AtomicOrdering::Relaxed),
        };
        found
    }

    /// Insert a compiled query, evicting the oldest entry when full.
    ///
    /// Re-inserting an existing key replaces the value in place.
    pub fn insert(&self, key: CacheKey, compiled: CompiledQuery) -> Arc<CompiledQuery> {
        let compiled = Arc::new(compiled);
        let mut inner = self.inner.lock();

        if let Some(slot) = inner.entries.get_mut(&key) {
            *slot = Arc::clone(&compiled);
            return compiled;
        }

        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            self.stats.evictions.fetch_add(1, AtomicOrdering::Relaxed);
            tracing::trace!(hash = %oldest.hash, "evicted compiled query");
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, Arc::clone(&compiled));
        compiled
    }

    /// Whether a key is cached, without touching statistics.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the current number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl Default for CompiledQueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
