//! OpenSky `/states/all` payload normalisation.
//!
//! The upstream answers with positional arrays:
//!
//! ```text
//! [icao24, callsign, origin_country, time_position, last_contact,
//!  longitude, latitude, baro_altitude, on_ground, velocity, true_track,
//!  vertical_rate, sensors, geo_altitude, squawk, spi, position_source,
//!  category]
//! ```
//!
//! Every field is validated independently. A record with an unusable
//! position or contact time is dropped on its own; the rest of the batch
//! survives.

use serde_json::Value;

use crate::flight::Flight;
use crate::geo::BoundingBox;

/// OpenSky state vector endpoint.
pub const DEFAULT_STATES_URL: &str = "https://opensky-network.org/api/states/all";

mod field {
    pub const ICAO24: usize = 0;
    pub const CALLSIGN: usize = 1;
    pub const ORIGIN_COUNTRY: usize = 2;
    pub const TIME_POSITION: usize = 3;
    pub const LAST_CONTACT: usize = 4;
    pub const LONGITUDE: usize = 5;
    pub const LATITUDE: usize = 6;
    pub const BARO_ALTITUDE: usize = 7;
    pub const ON_GROUND: usize = 8;
    pub const VELOCITY: usize = 9;
    pub const TRUE_TRACK: usize = 10;
    pub const VERTICAL_RATE: usize = 11;
    pub const GEO_ALTITUDE: usize = 13;
    pub const SQUAWK: usize = 14;
    pub const POSITION_SOURCE: usize = 16;
    pub const CATEGORY: usize = 17;
}

/// A decoded `/states/all` body before per-record validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatesSnapshot {
    /// Upstream `time` field, epoch seconds.
    pub as_of: Option<f64>,
    pub records: Vec<Vec<Value>>,
}

impl StatesSnapshot {
    /// Normalise every record, dropping the unusable ones.
    pub fn flights(&self) -> Vec<Flight> {
        self.records.iter().filter_map(|r| to_flight(r)).collect()
    }
}

/// Extract the state records from a decoded body.
///
/// Returns `None` unless the body is an object with a `states` array.
/// OpenSky answers `"states": null` when nothing matches, which reads as an
/// empty array. Non-array entries inside the array are skipped.
pub fn parse_snapshot(raw: &Value) -> Option<StatesSnapshot> {
    let object = raw.as_object()?;
    let records = match object.get("states")? {
        Value::Null => Vec::new(),
        Value::Array(states) => states
            .iter()
            .filter_map(|entry| entry.as_array().cloned())
            .collect(),
        _ => return None,
    };

    Some(StatesSnapshot {
        as_of: object.get("time").and_then(Value::as_f64),
        records,
    })
}

/// Decode and extract in one step; undecodable bodies yield `None`.
pub fn parse_snapshot_bytes(body: &[u8]) -> Option<StatesSnapshot> {
    let raw: Value = serde_json::from_slice(body).ok()?;
    parse_snapshot(&raw)
}

/// Build a [`Flight`] from one positional record.
///
/// Returns `None` if the address is blank, the position is missing or out of
/// range, or `last_contact` is not positive.
pub fn to_flight(record: &[Value]) -> Option<Flight> {
    let icao24 = string_at(record, field::ICAO24)?.trim().to_ascii_lowercase();
    if icao24.is_empty() {
        return None;
    }

    let latitude = number_at(record, field::LATITUDE).filter(|v| (-90.0..=90.0).contains(v))?;
    let longitude =
        number_at(record, field::LONGITUDE).filter(|v| (-180.0..=180.0).contains(v))?;

    let last_contact = number_at(record, field::LAST_CONTACT)?.trunc() as i64;
    if last_contact <= 0 {
        return None;
    }

    let baro_altitude = number_at(record, field::BARO_ALTITUDE);
    let geo_altitude = number_at(record, field::GEO_ALTITUDE);

    Some(Flight {
        icao24,
        callsign: string_at(record, field::CALLSIGN)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        country: string_at(record, field::ORIGIN_COUNTRY)
            .map(str::to_string)
            .unwrap_or_default(),
        longitude,
        latitude,
        altitude: baro_altitude.or(geo_altitude),
        heading: number_at(record, field::TRUE_TRACK).map(normalize_heading),
        velocity: number_at(record, field::VELOCITY),
        vertical_rate: number_at(record, field::VERTICAL_RATE),
        on_ground: record
            .get(field::ON_GROUND)
            .and_then(Value::as_bool)
            .unwrap_or(false),
        squawk: string_at(record, field::SQUAWK)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        baro_altitude,
        geo_altitude,
        last_contact,
        last_position_update: number_at(record, field::TIME_POSITION),
        category: integer_at(record, field::CATEGORY),
        position_source: integer_at(record, field::POSITION_SOURCE),
    })
}

/// Request URL for a bounding box query.
pub fn bounds_url(base: &str, bounds: &BoundingBox) -> String {
    format!(
        "{}?lamin={}&lomin={}&lamax={}&lomax={}",
        base, bounds.south, bounds.west, bounds.north, bounds.east
    )
}

/// Request URL for a single transponder address (already validated hex).
pub fn icao_url(base: &str, icao24: &str) -> String {
    format!("{}?icao24={}", base, icao24)
}

/// Map any finite heading into [0, 360).
pub fn normalize_heading(degrees: f64) -> f64 {
    ((degrees % 360.0) + 360.0) % 360.0
}

fn number_at(record: &[Value], index: usize) -> Option<f64> {
    record
        .get(index)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn integer_at(record: &[Value], index: usize) -> i64 {
    number_at(record, index).map(|v| v.trunc() as i64).unwrap_or(0)
}

fn string_at(record: &[Value], index: usize) -> Option<&str> {
    record.get(index).and_then(Value::as_str)
}
