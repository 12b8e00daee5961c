//! Aircraft domain types and wire envelopes.
//!
//! A [`Flight`] is rebuilt from scratch on every poll; nothing here is persisted.
//! The response envelopes are the JSON bodies of the HTTP surface and are shared
//! verbatim by the server and the polling client.

mod squawk;
mod source;
pub mod units;

pub use source::PositionSource;
pub use squawk::{squawk_alert, AlertSeverity, SquawkAlert};

use serde::{Deserialize, Serialize};

use crate::geo::BoundingBox;

/// Seconds without contact after which an aircraft is drawn as stale.
pub const STALE_CONTACT_SECS: f64 = 60.0;

/// One aircraft as reported by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    /// ICAO 24-bit transponder address, 6 lowercase hex digits.
    pub icao24: String,
    /// Trimmed callsign, possibly empty.
    pub callsign: String,
    /// Country of registry.
    pub country: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Display altitude in metres (barometric, else geometric).
    pub altitude: Option<f64>,
    /// True track in degrees, normalised to [0, 360).
    pub heading: Option<f64>,
    /// Ground speed in m/s.
    pub velocity: Option<f64>,
    /// Vertical rate in m/s.
    pub vertical_rate: Option<f64>,
    pub on_ground: bool,
    pub squawk: Option<String>,
    pub baro_altitude: Option<f64>,
    pub geo_altitude: Option<f64>,
    /// Epoch seconds of the last message of any kind.
    pub last_contact: i64,
    /// Epoch seconds of the last position fix.
    pub last_position_update: Option<f64>,
    pub category: i64,
    pub position_source: i64,
}

impl Flight {
    /// True if the squawk code is one of the reserved alert codes.
    pub fn is_emergency(&self) -> bool {
        squawk_alert(self.squawk.as_deref()).is_some()
    }

    /// True if no message was received for more than [`STALE_CONTACT_SECS`].
    pub fn is_stale_at(&self, now_secs: f64) -> bool {
        now_secs - self.last_contact as f64 > STALE_CONTACT_SECS
    }

    /// True if the aircraft lies inside `bounds` (edges inclusive).
    pub fn is_within(&self, bounds: &BoundingBox) -> bool {
        bounds.contains(self.latitude, self.longitude)
    }

    pub fn position_source(&self) -> PositionSource {
        PositionSource::from_code(self.position_source)
    }
}

/// Body of `GET /api/flights`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightsResponse {
    pub flights: Vec<Flight>,
    /// Epoch milliseconds of the snapshot.
    pub timestamp: i64,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl FlightsResponse {
    /// A live snapshot with `count` derived from `flights`.
    pub fn new(flights: Vec<Flight>, timestamp: i64) -> Self {
        let count = flights.len();
        Self {
            flights,
            timestamp,
            count,
            ..Default::default()
        }
    }

    /// An empty result carrying an error label.
    pub fn empty(timestamp: i64, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Mark as rate limited with a retry hint.
    pub fn with_rate_limit(mut self, retry_after_seconds: u64) -> Self {
        self.rate_limited = Some(true);
        self.retry_after_seconds = Some(retry_after_seconds);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited == Some(true)
    }
}

/// Body of `GET /api/flight`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightResponse {
    pub flight: Option<Flight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl FlightResponse {
    pub fn found(flight: Flight, timestamp: i64) -> Self {
        Self {
            flight: Some(flight),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    pub fn missing(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_rate_limit(mut self, retry_after_seconds: u64) -> Self {
        self.rate_limited = Some(true);
        self.retry_after_seconds = Some(retry_after_seconds);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
