//! Spherical-earth helpers for path overlays.

use serde::Serialize;

use super::EARTH_RADIUS_KM;

/// Default distance of the heading projection drawn when no route is known.
pub const HEADING_PROJECTION_KM: f64 = 500.0;

/// Default number of segments in the heading projection.
pub const HEADING_PROJECTION_POINTS: usize = 20;

/// Default number of segments in a great-circle arc.
pub const GREAT_CIRCLE_POINTS: usize = 64;

/// A longitude/latitude pair in degrees (GeoJSON coordinate order).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Points along the great circle from `(lat1, lon1)` to `(lat2, lon2)`.
///
/// Returns `points + 1` coordinates including both endpoints, or just the two
/// endpoints when they (nearly) coincide.
pub fn great_circle_arc(lat1: f64, lon1: f64, lat2: f64, lon2: f64, points: usize) -> Vec<LonLat> {
    let (phi1, lambda1) = (lat1.to_radians(), lon1.to_radians());
    let (phi2, lambda2) = (lat2.to_radians(), lon2.to_radians());

    let d = 2.0
        * (((phi2 - phi1) / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * ((lambda2 - lambda1) / 2.0).sin().powi(2))
        .sqrt()
        .asin();

    if d < 1e-10 || points == 0 {
        return vec![LonLat::new(lon1, lat1), LonLat::new(lon2, lat2)];
    }

    (0..=points)
        .map(|i| {
            let f = i as f64 / points as f64;
            let a = ((1.0 - f) * d).sin() / d.sin();
            let b = (f * d).sin() / d.sin();
            let x = a * phi1.cos() * lambda1.cos() + b * phi2.cos() * lambda2.cos();
            let y = a * phi1.cos() * lambda1.sin() + b * phi2.cos() * lambda2.sin();
            let z = a * phi1.sin() + b * phi2.sin();
            let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
            let lon = y.atan2(x).to_degrees();
            LonLat::new(lon, lat)
        })
        .collect()
}

/// Straight-line (constant initial bearing) projection from a point.
///
/// Returns the start point followed by `points` evenly spaced destinations up
/// to `distance_km` along `heading_deg`.
pub fn project_heading(
    lat: f64,
    lon: f64,
    heading_deg: f64,
    distance_km: f64,
    points: usize,
) -> Vec<LonLat> {
    let bearing = heading_deg.to_radians();
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();

    let mut coords = Vec::with_capacity(points + 1);
    coords.push(LonLat::new(lon, lat));

    for i in 1..=points {
        let d = (distance_km * (i as f64 / points as f64)) / EARTH_RADIUS_KM;
        let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * bearing.cos()).asin();
        let lon2 = lon1
            + (bearing.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());
        coords.push(LonLat::new(lon2.to_degrees(), lat2.to_degrees()));
    }

    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let km = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((km - 111.19).abs() < 0.1, "got {km}");
    }

    #[test]
    fn test_great_circle_endpoints() {
        let arc = great_circle_arc(50.0, 8.0, 40.6, -73.8, GREAT_CIRCLE_POINTS);
        assert_eq!(arc.len(), GREAT_CIRCLE_POINTS + 1);

        let first = arc.first().unwrap();
        let last = arc.last().unwrap();
        assert!((first.lat - 50.0).abs() < 1e-9 && (first.lon - 8.0).abs() < 1e-9);
        assert!((last.lat - 40.6).abs() < 1e-9 && (last.lon + 73.8).abs() < 1e-9);

        // The arc bulges poleward of both endpoints on a transatlantic route
        assert!(arc.iter().any(|p| p.lat > 50.0));
    }

    #[test]
    fn test_great_circle_degenerate() {
        let arc = great_circle_arc(10.0, 10.0, 10.0, 10.0, GREAT_CIRCLE_POINTS);
        assert_eq!(arc.len(), 2);
    }

    #[test]
    fn test_project_heading_north() {
        let coords = project_heading(0.0, 0.0, 0.0, HEADING_PROJECTION_KM, HEADING_PROJECTION_POINTS);
        assert_eq!(coords.len(), HEADING_PROJECTION_POINTS + 1);

        let end = coords.last().unwrap();
        assert!(end.lon.abs() < 1e-9);
        // 500 km is ~4.5 degrees of latitude
        assert!((end.lat - 4.4966).abs() < 0.01, "got {}", end.lat);
    }

    #[test]
    fn test_project_heading_distance() {
        let coords = project_heading(47.0, 8.0, 135.0, 100.0, 4);
        let end = coords.last().unwrap();
        let km = haversine_km(47.0, 8.0, end.lat, end.lon);
        assert!((km - 100.0).abs() < 0.5, "got {km}");
    }
}
