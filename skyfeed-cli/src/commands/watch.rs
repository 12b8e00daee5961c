//! Watch command - run a headless viewer and report what it would draw.
//!
//! Starts the poll loop, the selected-aircraft tracker and the interpolation
//! engine against a running server (or, with `--local`, an in-process
//! service) and prints a summary of the latest frame periodically.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use skyfeed::app::{build_state, Viewer};
use skyfeed::client::{FlightApi, HttpFlightApi, LocalFlightApi, DEFAULT_CLIENT_TIMEOUT};
use skyfeed::clock::system_clock;
use skyfeed::config::ConfigFile;
use skyfeed::flight::units::{meters_to_feet, mps_to_feet_per_minute, mps_to_knots};
use skyfeed::flight::Flight;
use skyfeed::geo::{haversine_km, BoundingBox, LonLat};
use skyfeed::interpolation::{PathOverlay, RenderFrame};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the watch command.
pub struct WatchArgs {
    pub server: Option<String>,
    pub bounds: Option<BoundingBox>,
    pub select: Option<String>,
    pub local: bool,
    pub report_secs: u64,
}

pub fn run(args: WatchArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("watch");

    let config = runner.config().clone();
    let bounds = args.bounds.unwrap_or_default();
    let session = WatchSession {
        bounds,
        select: args
            .select
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty()),
        report: Duration::from_secs(args.report_secs.max(1)),
        shutdown: runner.shutdown_token(),
    };

    println!("Watching {}", bounds);
    if args.local {
        println!("Source:   in-process service");
        println!("Press Ctrl+C to stop");
        let api = Arc::new(LocalFlightApi::new(build_state(&config)?));
        runner.block_on(session.run(api, &config));
    } else {
        let url = args.server.unwrap_or_else(|| config.client.server_url.clone());
        let api = HttpFlightApi::with_timeout(&url, DEFAULT_CLIENT_TIMEOUT)
            .map_err(|e| CliError::Config(e.to_string()))?;
        println!("Source:   {}", url);
        println!("Press Ctrl+C to stop");
        runner.block_on(session.run(Arc::new(api), &config));
    }

    Ok(())
}

struct WatchSession {
    bounds: BoundingBox,
    select: Option<String>,
    report: Duration,
    shutdown: CancellationToken,
}

impl WatchSession {
    async fn run<A: FlightApi + 'static>(self, api: Arc<A>, config: &ConfigFile) {
        let viewer = Viewer::spawn(api, system_clock(), config, self.bounds, self.shutdown.clone());
        viewer.select(self.select.clone());

        let mut route_requested = false;
        let mut destination: Option<LonLat> = None;
        let mut ticker = interval(self.report);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                _ = ticker.tick() => {
                    let state = viewer.state();
                    let frame = viewer.latest_frame();
                    let detail = self
                        .select
                        .as_deref()
                        .and_then(|id| state.current.iter().find(|f| f.icao24 == id));
                    let connection = format!("{:?}", state.connection);
                    println!("{}", summarize(&frame, &connection, detail, destination));
                    if let Some(error) = &state.error {
                        debug!(error = %error, "last poll degraded");
                    }

                    let pending = if route_requested { None } else { self.selected_callsign(&frame) };
                    if let Some((icao24, callsign)) = pending {
                        route_requested = true;
                        match viewer.resolve_destination(&icao24, &callsign).await {
                            Ok(Some(point)) => {
                                info!(callsign = %callsign, lat = point.lat, lon = point.lon, "route destination");
                                destination = Some(point);
                            }
                            Ok(None) => info!(callsign = %callsign, "no known route"),
                            Err(e) => warn!(callsign = %callsign, error = %e, "route lookup failed"),
                        }
                    }
                }
            }
        }

        viewer.shutdown().await;
        println!("Viewer stopped.");
    }

    /// The selected aircraft and its callsign, once it has one.
    fn selected_callsign(&self, frame: &RenderFrame) -> Option<(String, String)> {
        let icao24 = self.select.as_deref()?;
        let marker = frame.marker(icao24)?;
        (!marker.callsign.is_empty()).then(|| (icao24.to_string(), marker.callsign.clone()))
    }
}

/// One status line, plus a second for the selected aircraft.
///
/// `detail` is the selected aircraft's last polled record, when the bulk
/// snapshot has it.
fn summarize(
    frame: &RenderFrame,
    connection: &str,
    detail: Option<&Flight>,
    destination: Option<LonLat>,
) -> String {
    let emergencies = frame.aircraft.iter().filter(|m| m.emergency).count();
    let stale = frame.aircraft.iter().filter(|m| m.stale).count();
    let mut line = format!(
        "{:<13} {:>5} aircraft | {} emergency | {} stale",
        connection,
        frame.aircraft.len(),
        emergencies,
        stale
    );

    if let Some(selected) = &frame.selected {
        let path = match &selected.path {
            PathOverlay::GreatCircle(points) => format!("great circle ({} pts)", points.len()),
            PathOverlay::HeadingProjection(points) => format!("heading ({} pts)", points.len()),
            PathOverlay::None => "none".to_string(),
        };
        let (altitude, velocity) = frame
            .marker(&selected.icao24)
            .map(|m| (m.altitude, m.velocity))
            .unwrap_or_default();
        line.push_str(&format!(
            "\n  {} at {:.4},{:.4} | {:.0} ft | {:.0} kt",
            selected.icao24,
            selected.highlight.lat,
            selected.highlight.lon,
            meters_to_feet(altitude),
            mps_to_knots(velocity),
        ));
        if let Some(flight) = detail {
            if let Some(rate) = flight.vertical_rate {
                line.push_str(&format!(" | {:+.0} ft/min", mps_to_feet_per_minute(rate)));
            }
            line.push_str(&format!(" | {}", flight.position_source().label()));
        }
        line.push_str(&format!(" | trail {} pts | path {}", selected.trail.len(), path));
        if let Some(dest) = destination {
            let km = haversine_km(selected.highlight.lat, selected.highlight.lon, dest.lat, dest.lon);
            line.push_str(&format!(" | {:.0} km to go", km));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyfeed::geo::LonLat;
    use skyfeed::interpolation::{AircraftMarker, SelectedOverlay};

    fn marker(icao24: &str, emergency: bool) -> AircraftMarker {
        AircraftMarker {
            icao24: icao24.to_string(),
            callsign: "DLH4AB".to_string(),
            position: LonLat::new(8.0, 50.0),
            heading: 90.0,
            altitude: 10_000.0,
            velocity: 230.0,
            on_ground: false,
            selected: false,
            emergency,
            stale: false,
        }
    }

    #[test]
    fn test_summarize_counts() {
        let frame = RenderFrame {
            now_ms: 0,
            aircraft: vec![marker("aaaaaa", false), marker("bbbbbb", true)],
            selected: None,
        };
        let line = summarize(&frame, "Live", None, None);
        assert!(line.contains("2 aircraft"));
        assert!(line.contains("1 emergency"));
        assert!(!line.contains('\n'));
    }

    fn selected_frame() -> RenderFrame {
        RenderFrame {
            now_ms: 0,
            aircraft: vec![marker("aaaaaa", false)],
            selected: Some(SelectedOverlay {
                icao24: "aaaaaa".to_string(),
                highlight: LonLat::new(8.0, 50.0),
                trail: Vec::new(),
                path: PathOverlay::None,
            }),
        }
    }

    #[test]
    fn test_summarize_selected() {
        let line = summarize(&selected_frame(), "Live", None, None);
        assert!(line.contains("aaaaaa at 50.0000,8.0000"));
        assert!(line.contains("32808 ft"));
        assert!(line.contains("447 kt"));
        assert!(line.contains("path none"));
        assert!(!line.contains("km to go"));
    }

    #[test]
    fn test_summarize_selected_detail() {
        let detail = Flight {
            icao24: "aaaaaa".to_string(),
            callsign: "DLH4AB".to_string(),
            country: "Germany".to_string(),
            longitude: 8.0,
            latitude: 50.0,
            altitude: Some(10_000.0),
            heading: Some(90.0),
            velocity: Some(230.0),
            vertical_rate: Some(5.08),
            on_ground: false,
            squawk: None,
            baro_altitude: Some(10_000.0),
            geo_altitude: None,
            last_contact: 1_700_000_000,
            last_position_update: None,
            category: 0,
            position_source: 2,
        };
        let destination = LonLat::new(8.0, 51.0);
        let line = summarize(&selected_frame(), "Live", Some(&detail), Some(destination));
        assert!(line.contains("+1000 ft/min"));
        assert!(line.contains("| MLAT |"));
        assert!(line.contains("111 km to go"));
    }
}
