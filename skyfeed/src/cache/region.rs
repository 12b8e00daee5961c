//! Bulk snapshots keyed by quantized viewport.
//!
//! Viewers looking at nearly the same area share one upstream fetch: every
//! edge of the request is snapped to a 0.5° grid and the snapped box names
//! the cache slot. Because the snapped box may be slightly smaller than the
//! request, and a fallback may come from a different slot entirely, every
//! answer is re-filtered to the requested bounds before it leaves the cache.
//!
//! # Fallback preference
//!
//! ```text
//! exact key, younger than stale ceiling
//!   └─► else most recent live entry that covers the request
//!         └─► else most recent live entry that overlaps it
//!               └─► else most recent live entry of any kind
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{CacheConfig, CacheStats, Counters};
use crate::flight::{Flight, FlightsResponse};
use crate::geo::{BoundingBox, Coverage};

/// One successful bulk fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionEntry {
    /// Every flight the upstream returned for `bounds`.
    pub flights: Arc<Vec<Flight>>,
    /// Snapshot time reported to clients (epoch ms).
    pub timestamp: i64,
    /// The normalized bounds that were fetched.
    pub bounds: BoundingBox,
    /// When the fetch completed (epoch ms); drives all age checks.
    pub fetched_at: i64,
}

impl RegionEntry {
    pub fn new(flights: Vec<Flight>, timestamp: i64, bounds: BoundingBox, fetched_at: i64) -> Self {
        Self {
            flights: Arc::new(flights),
            timestamp,
            bounds,
            fetched_at,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.fetched_at
    }

    /// The entry as a response limited to `bounds`.
    pub fn filtered(&self, bounds: &BoundingBox) -> FlightsResponse {
        FlightsResponse::new(filter_to_bounds(&self.flights, bounds), self.timestamp)
    }
}

/// Snap every edge to the nearest multiple of `step`, halves rounding up.
pub fn snap_to_grid(bounds: &BoundingBox, step: f64) -> BoundingBox {
    let snap = |v: f64| (v / step + 0.5).floor() * step + 0.0;
    BoundingBox {
        south: snap(bounds.south),
        west: snap(bounds.west),
        north: snap(bounds.north),
        east: snap(bounds.east),
    }
}

/// Cache key for `bounds`: snapped edges with two decimals joined by `_`.
pub fn cache_key(bounds: &BoundingBox, step: f64) -> String {
    let snapped = snap_to_grid(bounds, step);
    format!(
        "{:.2}_{:.2}_{:.2}_{:.2}",
        snapped.south, snapped.west, snapped.north, snapped.east
    )
}

/// Flights inside `bounds`, edges inclusive.
pub fn filter_to_bounds(flights: &[Flight], bounds: &BoundingBox) -> Vec<Flight> {
    flights
        .iter()
        .filter(|f| f.is_within(bounds))
        .cloned()
        .collect()
}

/// Region snapshot table.
pub struct RegionCache {
    entries: Mutex<HashMap<String, RegionEntry>>,
    config: CacheConfig,
    counters: Counters,
}

impl RegionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Key for `bounds` under this cache's grid step.
    pub fn key_for(&self, bounds: &BoundingBox) -> String {
        cache_key(bounds, self.config.key_step)
    }

    pub fn get(&self, key: &str) -> Option<RegionEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn put(&self, key: String, entry: RegionEntry) {
        self.entries.lock().insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serve `entry` if it is younger than the TTL.
    pub fn fresh(
        &self,
        entry: Option<&RegionEntry>,
        bounds: &BoundingBox,
        now_ms: i64,
    ) -> Option<FlightsResponse> {
        match entry {
            Some(entry) if entry.age_ms(now_ms) < self.config.ttl_ms => {
                self.counters.hit();
                debug!(bounds = %bounds, age_ms = entry.age_ms(now_ms), "region cache hit");
                Some(entry.filtered(bounds))
            }
            _ => {
                self.counters.miss();
                None
            }
        }
    }

    /// Drop entries past the stale ceiling once the table is over capacity.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self, now_ms: i64) -> usize {
        let mut entries = self.entries.lock();
        if entries.len() <= self.config.max_region_entries {
            return 0;
        }
        let before = entries.len();
        let ceiling = self.config.stale_ceiling_ms;
        entries.retain(|_, entry| entry.age_ms(now_ms) <= ceiling);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "pruned region cache");
        }
        removed
    }

    /// Best stale snapshot for `bounds`, filtered to it.
    ///
    /// `exact` is the entry stored under the request's own key, if any.
    /// Returns `None` only when no entry is younger than the stale ceiling.
    pub fn resolve_fallback(
        &self,
        bounds: &BoundingBox,
        now_ms: i64,
        exact: Option<&RegionEntry>,
    ) -> Option<FlightsResponse> {
        let ceiling = self.config.stale_ceiling_ms;

        if let Some(entry) = exact {
            if entry.age_ms(now_ms) < ceiling {
                self.counters.fallback();
                return Some(entry.filtered(bounds));
            }
        }

        let entries = self.entries.lock();
        let mut covering: Option<&RegionEntry> = None;
        let mut overlapping: Option<&RegionEntry> = None;
        let mut freshest: Option<&RegionEntry> = None;

        let newer = |candidate: &RegionEntry, best: Option<&RegionEntry>| {
            best.map_or(true, |b| candidate.fetched_at > b.fetched_at)
        };

        for entry in entries.values() {
            if entry.age_ms(now_ms) > ceiling {
                continue;
            }
            if newer(entry, freshest) {
                freshest = Some(entry);
            }
            match entry.bounds.coverage_of(bounds) {
                Coverage::Covers if newer(entry, covering) => covering = Some(entry),
                Coverage::Overlaps if newer(entry, overlapping) => overlapping = Some(entry),
                _ => {}
            }
        }

        let chosen = match (covering, overlapping) {
            (Some(entry), _) => entry,
            (None, Some(entry)) => entry,
            (None, None) => {
                let entry = freshest?;
                debug!(
                    bounds = %bounds,
                    source = %entry.bounds,
                    "no covering or overlapping snapshot, serving freshest"
                );
                entry
            }
        };

        self.counters.fallback();
        Some(chosen.filtered(bounds))
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }
}
