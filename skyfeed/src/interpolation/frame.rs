//! Render frames.
//!
//! A [`RenderFrame`] is everything a map surface needs to draw one animation
//! frame: a marker per aircraft at its dead-reckoned position, and for the
//! selected aircraft a highlight, its flown trail and the path ahead. Frames
//! are plain immutable values; [`render_frame`] depends on nothing but its
//! arguments.

use serde::Serialize;

use super::dead_reckoning::{elapsed_secs, extrapolate};
use crate::flight::Flight;
use crate::geo::sphere::{GREAT_CIRCLE_POINTS, HEADING_PROJECTION_KM, HEADING_PROJECTION_POINTS};
use crate::geo::{great_circle_arc, project_heading, LonLat};

/// One aircraft in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AircraftMarker {
    pub icao24: String,
    pub callsign: String,
    pub position: LonLat,
    /// Heading in degrees, 0 when unknown.
    pub heading: f64,
    /// Projected altitude in metres, 0 when unknown.
    pub altitude: f64,
    /// Ground speed in m/s, 0 when unknown.
    pub velocity: f64,
    pub on_ground: bool,
    pub selected: bool,
    pub emergency: bool,
    /// No contact for more than a minute.
    pub stale: bool,
}

/// Path drawn ahead of the selected aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "coordinates", rename_all = "camelCase")]
pub enum PathOverlay {
    /// Great-circle arc to the known destination.
    GreatCircle(Vec<LonLat>),
    /// Straight projection along the current heading.
    HeadingProjection(Vec<LonLat>),
    None,
}

/// Overlay for the selected aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOverlay {
    pub icao24: String,
    pub highlight: LonLat,
    /// Flown trail ending at the highlight; empty without enough history.
    pub trail: Vec<LonLat>,
    pub path: PathOverlay,
}

/// One animation frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    /// Epoch milliseconds the frame was computed for.
    pub now_ms: i64,
    pub aircraft: Vec<AircraftMarker>,
    pub selected: Option<SelectedOverlay>,
}

impl RenderFrame {
    pub fn marker(&self, icao24: &str) -> Option<&AircraftMarker> {
        self.aircraft.iter().find(|m| m.icao24 == icao24)
    }
}

/// What is selected and what is known about it.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub icao24: &'a str,
    /// Recorded trail, oldest first.
    pub trail: &'a [LonLat],
    /// Route destination, when the route lookup found one.
    pub destination: Option<LonLat>,
}

/// Compute the frame for `flights` received at `batch_ms`, as seen at `now_ms`.
pub fn render_frame(
    flights: &[Flight],
    batch_ms: i64,
    now_ms: i64,
    selection: Option<&Selection<'_>>,
) -> RenderFrame {
    let now_secs = now_ms as f64 / 1000.0;
    let selected_icao = selection.map(|s| s.icao24);

    let aircraft: Vec<AircraftMarker> = flights
        .iter()
        .map(|flight| {
            let projected = extrapolate(flight, elapsed_secs(flight, batch_ms, now_ms));
            AircraftMarker {
                icao24: flight.icao24.clone(),
                callsign: flight.callsign.clone(),
                position: LonLat::new(projected.longitude, projected.latitude),
                heading: flight.heading.unwrap_or(0.0),
                altitude: projected.altitude.unwrap_or(0.0),
                velocity: flight.velocity.unwrap_or(0.0),
                on_ground: flight.on_ground,
                selected: selected_icao == Some(flight.icao24.as_str()),
                emergency: flight.is_emergency(),
                stale: flight.is_stale_at(now_secs),
            }
        })
        .collect();

    let selected = selection.and_then(|selection| {
        let flight = flights.iter().find(|f| f.icao24 == selection.icao24)?;
        let marker = aircraft.iter().find(|m| m.icao24 == selection.icao24)?;
        Some(selected_overlay(flight, marker.position, selection))
    });

    RenderFrame {
        now_ms,
        aircraft,
        selected,
    }
}

fn selected_overlay(flight: &Flight, point: LonLat, selection: &Selection<'_>) -> SelectedOverlay {
    let trail = if selection.trail.len() >= 2 {
        let mut trail = selection.trail.to_vec();
        trail.push(point);
        trail
    } else {
        Vec::new()
    };

    let path = match (selection.destination, flight.heading) {
        (Some(dest), _) => PathOverlay::GreatCircle(great_circle_arc(
            point.lat,
            point.lon,
            dest.lat,
            dest.lon,
            GREAT_CIRCLE_POINTS,
        )),
        (None, Some(heading)) => PathOverlay::HeadingProjection(project_heading(
            point.lat,
            point.lon,
            heading,
            HEADING_PROJECTION_KM,
            HEADING_PROJECTION_POINTS,
        )),
        (None, None) => PathOverlay::None,
    };

    SelectedOverlay {
        icao24: flight.icao24.clone(),
        highlight: point,
        trail,
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::tests::sample_flight;

    const NOW_MS: i64 = 1_700_000_003_000;

    fn flights() -> Vec<Flight> {
        let mut emergency = sample_flight("bbbbbb", 51.0, 9.0);
        emergency.squawk = Some("7600".to_string());
        emergency.last_contact = 1_700_000_003 - 61;
        vec![sample_flight("aaaaaa", 50.0, 8.0), emergency]
    }

    #[test]
    fn test_same_input_same_frame() {
        let flights = flights();
        let trail = [LonLat::new(7.9, 50.0), LonLat::new(7.95, 50.0)];
        let selection = Selection {
            icao24: "aaaaaa",
            trail: &trail,
            destination: Some(LonLat::new(-73.78, 40.64)),
        };

        let first = render_frame(&flights, NOW_MS - 1_000, NOW_MS, Some(&selection));
        let second = render_frame(&flights, NOW_MS - 1_000, NOW_MS, Some(&selection));
        assert_eq!(first, second);
    }

    #[test]
    fn test_markers_are_extrapolated_and_flagged() {
        let frame = render_frame(&flights(), 0, NOW_MS, None);
        assert_eq!(frame.aircraft.len(), 2);
        assert!(frame.selected.is_none());

        // 230 m/s due east for 3 s.
        let a = frame.marker("aaaaaa").unwrap();
        assert!(a.position.lon > 8.0);
        assert!((a.position.lat - 50.0).abs() < 1e-9);
        assert!(!a.stale && !a.emergency && !a.selected);

        let b = frame.marker("bbbbbb").unwrap();
        assert!(b.stale);
        assert!(b.emergency);
    }

    #[test]
    fn test_selected_overlay_with_destination() {
        let flights = flights();
        let trail = [LonLat::new(7.9, 50.0), LonLat::new(7.95, 50.0)];
        let selection = Selection {
            icao24: "aaaaaa",
            trail: &trail,
            destination: Some(LonLat::new(-73.78, 40.64)),
        };
        let frame = render_frame(&flights, 0, NOW_MS, Some(&selection));
        let overlay = frame.selected.unwrap();
        let marker = frame.aircraft[0].clone();

        assert!(marker.selected);
        assert_eq!(overlay.highlight, marker.position);
        assert_eq!(overlay.trail.len(), 3);
        assert_eq!(overlay.trail[2], marker.position);
        match overlay.path {
            PathOverlay::GreatCircle(arc) => {
                assert_eq!(arc.len(), GREAT_CIRCLE_POINTS + 1);
                assert!((arc[0].lon - marker.position.lon).abs() < 1e-9);
                assert!((arc[0].lat - marker.position.lat).abs() < 1e-9);
            }
            other => panic!("expected great circle, got {:?}", other),
        }
    }

    #[test]
    fn test_selected_overlay_fallbacks() {
        let mut flights = flights();
        let short_trail = [LonLat::new(7.9, 50.0)];
        let selection = Selection {
            icao24: "aaaaaa",
            trail: &short_trail,
            destination: None,
        };

        let frame = render_frame(&flights, 0, NOW_MS, Some(&selection));
        let overlay = frame.selected.unwrap();
        assert!(overlay.trail.is_empty());
        assert!(matches!(overlay.path, PathOverlay::HeadingProjection(ref p) if p.len() == HEADING_PROJECTION_POINTS + 1));

        flights[0].heading = None;
        let frame = render_frame(&flights, 0, NOW_MS, Some(&selection));
        assert_eq!(frame.selected.unwrap().path, PathOverlay::None);
    }

    #[test]
    fn test_selection_missing_from_flights() {
        let selection = Selection {
            icao24: "ffffff",
            trail: &[],
            destination: None,
        };
        let frame = render_frame(&flights(), 0, NOW_MS, Some(&selection));
        assert!(frame.selected.is_none());
        assert!(frame.aircraft.iter().all(|m| !m.selected));
    }
}
