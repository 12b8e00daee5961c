//! Flat-earth dead reckoning.
//!
//! Positions are projected along the reported track at the reported ground
//! speed. Over the few seconds between polls the flat-earth error is far below
//! what is visible on a map.

use crate::flight::Flight;
use crate::geo::METERS_PER_DEGREE_LAT;

/// Longest extrapolation applied to any aircraft.
pub const MAX_EXTRAPOLATION_SECS: f64 = 6.0;

/// Stand-in for `cos(lat)` when it is exactly zero.
const MIN_COS_LAT: f64 = 0.01;

/// Degrees of latitude and longitude covered per second.
pub fn degrees_per_second(velocity_ms: f64, heading_deg: f64, latitude: f64) -> (f64, f64) {
    let heading = heading_deg.to_radians();
    let cos_lat = match latitude.to_radians().cos() {
        c if c == 0.0 => MIN_COS_LAT,
        c => c,
    };
    (
        velocity_ms * heading.cos() / METERS_PER_DEGREE_LAT,
        velocity_ms * heading.sin() / (METERS_PER_DEGREE_LAT * cos_lat),
    )
}

/// Project `(latitude, longitude)` forward by `secs`, without clamping.
pub fn project(latitude: f64, longitude: f64, velocity_ms: f64, heading_deg: f64, secs: f64) -> (f64, f64) {
    let (dlat, dlon) = degrees_per_second(velocity_ms, heading_deg, latitude);
    (latitude + dlat * secs, longitude + dlon * secs)
}

/// Seconds to extrapolate `flight` by at `now_ms`, clamped to
/// `[0, MAX_EXTRAPOLATION_SECS]`.
///
/// Uses the transponder's own position timestamp when present, else the time
/// the batch was received.
pub fn elapsed_secs(flight: &Flight, batch_ms: i64, now_ms: i64) -> f64 {
    let elapsed = match flight.last_position_update {
        Some(position_secs) => now_ms as f64 / 1000.0 - position_secs,
        None => (now_ms - batch_ms) as f64 / 1000.0,
    };
    elapsed.clamp(0.0, MAX_EXTRAPOLATION_SECS)
}

/// A dead-reckoned position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrapolated {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

/// Dead-reckon `flight` forward by `secs`.
///
/// Only airborne aircraft with a positive speed and a known heading move;
/// altitude follows the vertical rate when both are known and never goes
/// below zero.
pub fn extrapolate(flight: &Flight, secs: f64) -> Extrapolated {
    let mut position = Extrapolated {
        latitude: flight.latitude,
        longitude: flight.longitude,
        altitude: flight.altitude,
    };

    let (Some(velocity), Some(heading)) = (flight.velocity, flight.heading) else {
        return position;
    };
    if flight.on_ground || velocity <= 0.0 {
        return position;
    }

    let (latitude, longitude) = project(flight.latitude, flight.longitude, velocity, heading, secs);
    position.latitude = latitude;
    position.longitude = longitude;

    if let (Some(rate), Some(altitude)) = (flight.vertical_rate, flight.altitude) {
        position.altitude = Some((altitude + rate * secs).max(0.0));
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::tests::sample_flight;

    #[test]
    fn test_due_east_at_equator() {
        let (lat, lon) = project(0.0, 0.0, 100.0, 90.0, 10.0);
        assert!((lon - 1000.0 / 111_320.0).abs() < 1e-12);
        assert!(lat.abs() < 1e-12);
    }

    #[test]
    fn test_due_north() {
        let (lat, lon) = project(50.0, 8.0, 111.32, 0.0, 1.0);
        assert!((lat - 50.001).abs() < 1e-9);
        assert!((lon - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_longitude_scales_with_latitude() {
        let (_, at_equator) = degrees_per_second(200.0, 90.0, 0.0);
        let (_, at_sixty) = degrees_per_second(200.0, 90.0, 60.0);
        assert!((at_sixty / at_equator - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_prefers_position_timestamp_and_clamps() {
        let mut flight = sample_flight("3c6444", 50.0, 8.0);
        flight.last_position_update = Some(1_700_000_000.0);

        assert_eq!(elapsed_secs(&flight, 0, 1_700_000_002_500), 2.5);
        assert_eq!(elapsed_secs(&flight, 0, 1_700_000_030_000), MAX_EXTRAPOLATION_SECS);
        // Clock skew never moves an aircraft backwards.
        assert_eq!(elapsed_secs(&flight, 0, 1_699_999_999_000), 0.0);

        flight.last_position_update = None;
        assert_eq!(elapsed_secs(&flight, 10_000, 13_000), 3.0);
    }

    #[test]
    fn test_ground_and_unknown_kinematics_do_not_move() {
        let mut flight = sample_flight("3c6444", 50.0, 8.0);
        flight.on_ground = true;
        assert_eq!(extrapolate(&flight, 5.0).longitude, 8.0);

        flight.on_ground = false;
        flight.heading = None;
        assert_eq!(extrapolate(&flight, 5.0).longitude, 8.0);

        flight.heading = Some(90.0);
        flight.velocity = Some(0.0);
        assert_eq!(extrapolate(&flight, 5.0).longitude, 8.0);
    }

    #[test]
    fn test_altitude_follows_vertical_rate_and_floors_at_zero() {
        let mut flight = sample_flight("3c6444", 50.0, 8.0);
        flight.altitude = Some(100.0);
        flight.vertical_rate = Some(-30.0);

        assert_eq!(extrapolate(&flight, 2.0).altitude, Some(40.0));
        assert_eq!(extrapolate(&flight, 6.0).altitude, Some(0.0));

        flight.altitude = None;
        assert_eq!(extrapolate(&flight, 2.0).altitude, None);
    }
}
