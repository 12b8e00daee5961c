//! Single-aircraft answers keyed by transponder address.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{CacheConfig, CacheStats, Counters};
use crate::flight::Flight;

/// One successful single-aircraft fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftEntry {
    pub flight: Flight,
    /// When the fetch completed (epoch ms).
    pub timestamp: i64,
}

/// Per-aircraft table with a short TTL.
///
/// Kept apart from the region table: a tracked aircraft is polled far more
/// often than a viewport and must not evict region snapshots.
pub struct AircraftCache {
    entries: Mutex<HashMap<String, AircraftEntry>>,
    ttl_ms: i64,
    stale_ceiling_ms: i64,
    max_entries: usize,
    counters: Counters,
}

impl AircraftCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: config.single_ttl_ms,
            stale_ceiling_ms: config.stale_ceiling_ms,
            max_entries: config.max_single_entries,
            counters: Counters::default(),
        }
    }

    /// Entry younger than the TTL.
    pub fn fresh(&self, icao24: &str, now_ms: i64) -> Option<AircraftEntry> {
        let entry = self
            .entries
            .lock()
            .get(icao24)
            .filter(|e| now_ms - e.timestamp < self.ttl_ms)
            .cloned();
        match entry {
            Some(_) => self.counters.hit(),
            None => self.counters.miss(),
        }
        entry
    }

    /// Entry younger than the stale ceiling, for degraded answers.
    pub fn fallback(&self, icao24: &str, now_ms: i64) -> Option<AircraftEntry> {
        let entry = self
            .entries
            .lock()
            .get(icao24)
            .filter(|e| now_ms - e.timestamp < self.stale_ceiling_ms)
            .cloned();
        if entry.is_some() {
            self.counters.fallback();
        }
        entry
    }

    /// Store a fetch and prune expired entries once over capacity.
    pub fn put(&self, icao24: &str, flight: Flight, now_ms: i64) {
        let mut entries = self.entries.lock();
        entries.insert(
            icao24.to_string(),
            AircraftEntry {
                flight,
                timestamp: now_ms,
            },
        );
        if entries.len() > self.max_entries {
            let ceiling = self.stale_ceiling_ms;
            entries.retain(|_, e| now_ms - e.timestamp <= ceiling);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }
}
