//! adsbdb callsign lookup payloads.
//!
//! ```json
//! { "response": { "flightroute": {
//!     "callsign_iata": "LH400",
//!     "airline": { "iata": "LH", ... },
//!     "origin":      { "icao_code": "EDDF", "iata_code": "FRA", "name": "...", "latitude": 50.03, "longitude": 8.56 },
//!     "destination": { ... }
//! } } }
//! ```

use serde_json::{Map, Value};

use super::Airport;

/// adsbdb callsign endpoint; the callsign is appended.
pub const DEFAULT_ADSBDB_URL: &str = "https://api.adsbdb.com/v0/callsign";

/// Route fields extracted from one adsbdb answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRoute {
    pub departure: Option<Airport>,
    pub destination: Option<Airport>,
    pub operator_iata: Option<String>,
    pub flight_number: Option<String>,
}

/// Extract the route from a decoded body.
///
/// Returns `None` if there is no `response.flightroute` object.
pub fn parse_route(raw: &Value) -> Option<ParsedRoute> {
    let route = raw
        .get("response")
        .and_then(Value::as_object)?
        .get("flightroute")
        .and_then(Value::as_object)?;

    let flight_number = upper(route, "callsign_iata").filter(|s| !s.is_empty());
    let operator_iata = route
        .get("airline")
        .and_then(Value::as_object)
        .and_then(|airline| upper(airline, "iata"))
        .filter(|s| !s.is_empty())
        .or_else(|| flight_number.as_ref().map(|n| n.chars().take(2).collect()));

    Some(ParsedRoute {
        departure: route.get("origin").and_then(parse_airport),
        destination: route.get("destination").and_then(parse_airport),
        operator_iata,
        flight_number,
    })
}

/// An airport with an ICAO code and a valid position, or `None`.
pub fn parse_airport(raw: &Value) -> Option<Airport> {
    let airport = raw.as_object()?;
    let icao = upper(airport, "icao_code").filter(|s| !s.is_empty())?;
    let latitude = number(airport, "latitude").filter(|v| (-90.0..=90.0).contains(v))?;
    let longitude = number(airport, "longitude").filter(|v| (-180.0..=180.0).contains(v))?;

    Some(Airport {
        icao,
        iata: upper(airport, "iata_code").unwrap_or_default(),
        name: airport
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        latitude,
        longitude,
    })
}

fn upper(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_uppercase())
}

fn number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}
