//! Per-aircraft position history for drawing flown trails.
//!
//! # Design
//!
//! - One ordered record list per aircraft, oldest first
//! - A record is only appended once the aircraft moved at least
//!   [`MIN_MOVEMENT_DEG`] in latitude or longitude, so hovering or parked
//!   aircraft do not grow their history
//! - Records older than [`MAX_HISTORY_AGE_MS`] are evicted on append
//! - Histories of aircraft that left the snapshot are dropped once their newest
//!   record is older than [`MAX_HISTORY_AGE_MS`]

use std::collections::{HashMap, HashSet, VecDeque};

use crate::flight::Flight;
use crate::geo::LonLat;

/// Records older than this are evicted (5 minutes).
pub const MAX_HISTORY_AGE_MS: i64 = 5 * 60 * 1000;

/// Minimum movement in degrees (~100 m) before a new record is kept.
pub const MIN_MOVEMENT_DEG: f64 = 0.001;

/// A single recorded position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRecord {
    pub lon: f64,
    pub lat: f64,
    /// Display altitude in metres, if known.
    pub altitude: Option<f64>,
    /// Epoch milliseconds when the record was taken.
    pub timestamp: i64,
}

/// Configuration for position history.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum record age in milliseconds.
    pub max_age_ms: i64,
    /// Minimum movement in degrees for a new record.
    pub min_movement_deg: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_age_ms: MAX_HISTORY_AGE_MS,
            min_movement_deg: MIN_MOVEMENT_DEG,
        }
    }
}

/// Position history of every aircraft seen recently.
#[derive(Debug, Default)]
pub struct PositionHistory {
    tracks: HashMap<String, VecDeque<PositionRecord>>,
    config: HistoryConfig,
}

impl PositionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            tracks: HashMap::new(),
            config,
        }
    }

    /// Record a full bulk snapshot taken at `now_ms`.
    ///
    /// Every aircraft in `flights` gets a record if it moved; aircraft no
    /// longer present are forgotten once their history has gone cold.
    pub fn update(&mut self, flights: &[Flight], now_ms: i64) {
        for flight in flights {
            self.add_position(flight, now_ms);
        }

        let active: HashSet<&str> = flights.iter().map(|f| f.icao24.as_str()).collect();
        let cutoff = now_ms - self.config.max_age_ms;
        self.tracks.retain(|icao24, records| {
            active.contains(icao24.as_str())
                || records.back().is_some_and(|newest| newest.timestamp >= cutoff)
        });
    }

    /// Record one position, e.g. from the fast-polled selected aircraft.
    ///
    /// Returns true if the record was appended.
    pub fn add_position(&mut self, flight: &Flight, now_ms: i64) -> bool {
        let min_movement = self.config.min_movement_deg;
        let cutoff = now_ms - self.config.max_age_ms;
        let records = self.tracks.entry(flight.icao24.clone()).or_default();

        if let Some(last) = records.back() {
            let dlat = (flight.latitude - last.lat).abs();
            let dlon = (flight.longitude - last.lon).abs();
            if dlat < min_movement && dlon < min_movement {
                return false;
            }
        }

        records.push_back(PositionRecord {
            lon: flight.longitude,
            lat: flight.latitude,
            altitude: flight.altitude,
            timestamp: now_ms,
        });

        while records.front().is_some_and(|oldest| oldest.timestamp < cutoff) {
            records.pop_front();
        }
        true
    }

    /// Trail coordinates for `icao24`, oldest first.
    ///
    /// Empty unless at least two records exist; a single point is not a line.
    pub fn trail(&self, icao24: &str) -> Vec<LonLat> {
        match self.tracks.get(icao24) {
            Some(records) if records.len() >= 2 => records
                .iter()
                .map(|r| LonLat::new(r.lon, r.lat))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::tests::sample_flight;

    #[test]
    fn test_small_moves_are_not_recorded() {
        let mut history = PositionHistory::new();
        let mut flight = sample_flight("3c6444", 50.0, 8.0);

        assert!(history.add_position(&flight, 0));
        flight.latitude += 0.0005;
        flight.longitude += 0.0009;
        assert!(!history.add_position(&flight, 1_000));

        // Either axis crossing the threshold is enough.
        flight.longitude = 8.001;
        assert!(history.add_position(&flight, 2_000));
        assert_eq!(history.tracks["3c6444"].len(), 2);
    }

    #[test]
    fn test_trail_needs_two_points() {
        let mut history = PositionHistory::new();
        let flight = sample_flight("3c6444", 50.0, 8.0);
        history.add_position(&flight, 0);
        assert!(history.trail("3c6444").is_empty());
        assert!(history.trail("unknown").is_empty());

        let moved = sample_flight("3c6444", 50.1, 8.0);
        history.add_position(&moved, 5_000);
        assert_eq!(
            history.trail("3c6444"),
            vec![LonLat::new(8.0, 50.0), LonLat::new(8.0, 50.1)]
        );
    }

    #[test]
    fn test_old_records_are_evicted() {
        let mut history = PositionHistory::new();
        history.add_position(&sample_flight("3c6444", 50.0, 8.0), 0);
        history.add_position(&sample_flight("3c6444", 50.1, 8.0), 60_000);
        history.add_position(&sample_flight("3c6444", 50.2, 8.0), MAX_HISTORY_AGE_MS + 1);

        let records = &history.tracks["3c6444"];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, 60_000);
    }

    #[test]
    fn test_absent_aircraft_dropped_once_cold() {
        let mut history = PositionHistory::new();
        let a = sample_flight("aaaaaa", 50.0, 8.0);
        let b = sample_flight("bbbbbb", 51.0, 9.0);
        history.update(&[a.clone(), b], 0);
        assert_eq!(history.tracks.len(), 2);

        // `b` left the view but its history is still warm.
        history.update(std::slice::from_ref(&a), MAX_HISTORY_AGE_MS);
        assert_eq!(history.tracks.len(), 2);

        history.update(std::slice::from_ref(&a), MAX_HISTORY_AGE_MS + 1);
        assert_eq!(history.tracks.len(), 1);
        assert!(!history.tracks.contains_key("bbbbbb"));
    }
}
