//! In-memory snapshot caches for the fetch orchestrator.
//!
//! Two tables live here:
//!
//! - [`RegionCache`]: bulk snapshots keyed by a quantized bounding box, used
//!   both for fresh hits and as the pool of stale-but-useful fallbacks.
//! - [`AircraftCache`]: single-aircraft answers keyed by transponder address.
//!
//! Both are guarded by a `parking_lot::Mutex` that is only taken for short,
//! synchronous sections; no lock is ever held across an `.await`.

mod region;
mod single;

pub use region::{cache_key, filter_to_bounds, snap_to_grid, RegionCache, RegionEntry};
pub use single::{AircraftCache, AircraftEntry};

use std::sync::atomic::{AtomicU64, Ordering};

/// Region snapshots are served without refetching for this long.
pub const DEFAULT_CACHE_TTL_MS: i64 = 5_000;

/// Entries older than this are never served, not even as a fallback.
pub const DEFAULT_STALE_CEILING_MS: i64 = 60_000;

/// Grid step (degrees) for region cache keys.
pub const DEFAULT_KEY_STEP: f64 = 0.5;

/// Table size above which expired region entries are pruned.
pub const DEFAULT_MAX_REGION_ENTRIES: usize = 50;

/// Single-aircraft answers are served without refetching for this long.
pub const DEFAULT_SINGLE_TTL_MS: i64 = 1_500;

/// Table size above which expired single-aircraft entries are pruned.
pub const DEFAULT_MAX_SINGLE_ENTRIES: usize = 50;

/// Freshness and size policy shared by both caches.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub ttl_ms: i64,
    pub stale_ceiling_ms: i64,
    pub key_step: f64,
    pub max_region_entries: usize,
    pub single_ttl_ms: i64,
    pub max_single_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            stale_ceiling_ms: DEFAULT_STALE_CEILING_MS,
            key_step: DEFAULT_KEY_STEP,
            max_region_entries: DEFAULT_MAX_REGION_ENTRIES,
            single_ttl_ms: DEFAULT_SINGLE_TTL_MS,
            max_single_entries: DEFAULT_MAX_SINGLE_ENTRIES,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn with_stale_ceiling_ms(mut self, ceiling_ms: i64) -> Self {
        self.stale_ceiling_ms = ceiling_ms;
        self
    }

    pub fn with_key_step(mut self, step: f64) -> Self {
        self.key_step = step;
        self
    }

    pub fn with_single_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.single_ttl_ms = ttl_ms;
        self
    }
}

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fallbacks: u64,
    pub entries: usize,
}

/// Lock-free hit/miss counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fallbacks: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            entries,
        }
    }
}
