//! Callsign route table.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use super::RouteResponse;

/// Routes rarely change during a flight.
pub const DEFAULT_ROUTE_TTL: Duration = Duration::from_secs(10 * 60);

/// Table size above which very old entries are evicted.
pub const MAX_ROUTE_ENTRIES: usize = 200;

struct RouteEntry {
    response: RouteResponse,
    stored_at: i64,
}

/// Cached route answers, including "not found" ones.
pub struct RouteCache {
    entries: Mutex<HashMap<String, RouteEntry>>,
    ttl_ms: i64,
}

impl RouteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: ttl.as_millis() as i64,
        }
    }

    /// Answer stored less than one TTL ago.
    pub fn get(&self, callsign: &str, now_ms: i64) -> Option<RouteResponse> {
        self.entries
            .lock()
            .get(callsign)
            .filter(|e| now_ms - e.stored_at < self.ttl_ms)
            .map(|e| e.response.clone())
    }

    /// Store an answer; over capacity, entries older than three TTLs go.
    pub fn put(&self, callsign: &str, response: RouteResponse, now_ms: i64) {
        let mut entries = self.entries.lock();
        entries.insert(
            callsign.to_string(),
            RouteEntry {
                response,
                stored_at: now_ms,
            },
        );
        if entries.len() > MAX_ROUTE_ENTRIES {
            let horizon = self.ttl_ms * 3;
            entries.retain(|_, e| now_ms - e.stored_at <= horizon);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_TTL)
    }
}
