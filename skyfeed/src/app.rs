//! Process wiring.
//!
//! Builds the pieces the CLI runs from a [`ConfigFile`]:
//!
//! ```text
//! serve:  ReqwestClient ─► CredentialCache ─► FlightService ─┐
//!                      └─────────────────► RouteService  ────┴─► ServerState ─► axum
//!
//! watch:  FlightApi ─► FlightPoller ────────┐
//!                  └─► SelectedFlightTracker┼─► InterpolationEngine ─► RenderFrame
//!                      (selection watcher) ─┘
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{
    tracking_target, ClientError, FlightApi, FlightDataState, FlightPoller, PollerHandle,
    SelectedFlightTracker, TrackerHandle,
};
use crate::clock::Clock;
use crate::config::{ConfigError, ConfigFile};
use crate::geo::{BoundingBox, LonLat};
use crate::interpolation::{EngineHandle, InterpolationEngine, RenderFrame, SelectionInput};
use crate::logging::LoggingError;
use crate::provider::{AsyncHttpClient, ClientCredentials, CredentialCache, ProviderError, ReqwestClient};
use crate::route::RouteService;
use crate::server::{serve, ServerError, ServerState};
use crate::service::{FlightService, FlightServiceConfig};

/// Errors from starting or running a SkyFeed process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("flight API: {0}")]
    Client(#[from] ClientError),
}

// ============================================================================
// Server
// ============================================================================

/// Server state backed by reqwest, with credentials from the environment.
pub fn build_state(config: &ConfigFile) -> Result<Arc<ServerState<ReqwestClient>>, AppError> {
    let client = Arc::new(ReqwestClient::new()?);
    Ok(build_state_with(
        client,
        ClientCredentials::from_env(),
        crate::clock::system_clock(),
        config,
    ))
}

/// Server state over any HTTP client.
pub fn build_state_with<C: AsyncHttpClient + 'static>(
    client: Arc<C>,
    credentials: Option<ClientCredentials>,
    clock: Arc<dyn Clock>,
    config: &ConfigFile,
) -> Arc<ServerState<C>> {
    let upstream = &config.upstream;

    let credentials = CredentialCache::new(Arc::clone(&client), credentials, Arc::clone(&clock))
        .with_token_url(upstream.token_url.clone());
    if credentials.is_configured() {
        info!("OpenSky credentials configured");
    } else {
        info!("no OpenSky credentials, using anonymous access");
    }

    let service_config = FlightServiceConfig::default()
        .with_states_url(upstream.states_url.clone())
        .with_bulk_timeout(upstream.bulk_timeout)
        .with_single_timeout(upstream.single_timeout)
        .with_cache(config.cache.clone());

    let flights = FlightService::new(
        Arc::clone(&client),
        credentials,
        Arc::clone(&clock),
        service_config,
    );
    let routes = RouteService::new(client, clock)
        .with_base_url(upstream.route_url.clone())
        .with_timeout(upstream.route_timeout);

    Arc::new(ServerState { flights, routes })
}

/// Run the HTTP server until `shutdown` is cancelled.
pub async fn run_server(config: &ConfigFile, shutdown: CancellationToken) -> Result<(), AppError> {
    let state = build_state(config)?;
    let served = serve(Arc::clone(&state), config.server.bind, shutdown).await;

    let stats = state.flights.stats();
    info!(
        region_hits = stats.regions.hits,
        region_misses = stats.regions.misses,
        region_fallbacks = stats.regions.fallbacks,
        region_entries = stats.regions.entries,
        aircraft_hits = stats.aircraft.hits,
        aircraft_misses = stats.aircraft.misses,
        aircraft_fallbacks = stats.aircraft.fallbacks,
        token_exchanges = stats.token_exchanges,
        "cache summary"
    );

    served?;
    Ok(())
}

// ============================================================================
// Viewer
// ============================================================================

/// The client side of one map view: poll loop, selected-aircraft tracker and
/// interpolation engine, connected by watch channels.
pub struct Viewer<A> {
    api: Arc<A>,
    poller: PollerHandle,
    tracker: Arc<TrackerHandle>,
    engine: EngineHandle,
    selection: watch::Sender<SelectionInput>,
    watcher: JoinHandle<()>,
    cancel: CancellationToken,
}

impl<A: FlightApi + 'static> Viewer<A> {
    /// Start every loop for a view of `bounds`.
    pub fn spawn(
        api: Arc<A>,
        clock: Arc<dyn Clock>,
        config: &ConfigFile,
        bounds: BoundingBox,
        cancel: CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let poller = FlightPoller::new(Arc::clone(&api), Arc::clone(&clock))
            .with_config(config.poller_config())
            .spawn(bounds, cancel.child_token());
        let tracker = Arc::new(
            SelectedFlightTracker::new(Arc::clone(&api), Arc::clone(&clock))
                .spawn(cancel.child_token()),
        );

        let (selection, selection_rx) = watch::channel(SelectionInput::default());
        let engine = InterpolationEngine::new(clock).with_fps(config.client.fps).spawn(
            poller.subscribe(),
            tracker.subscribe(),
            selection_rx.clone(),
            cancel.child_token(),
        );

        let watcher = tokio::spawn(watch_selection(
            poller.subscribe(),
            selection_rx,
            Arc::clone(&tracker),
            cancel.child_token(),
        ));

        Self {
            api,
            poller,
            tracker,
            engine,
            selection,
            watcher,
            cancel,
        }
    }

    pub fn set_bounds(&self, bounds: BoundingBox) {
        self.poller.set_bounds(bounds);
    }

    /// Select an aircraft, or clear the selection with `None`.
    pub fn select(&self, icao24: Option<String>) {
        self.selection.send_if_modified(|current| {
            if current.icao24 == icao24 {
                return false;
            }
            *current = SelectionInput {
                icao24,
                destination: None,
            };
            true
        });
    }

    /// Look up the route for `callsign` and, if its destination is known and
    /// `icao24` is still selected, draw the great-circle path to it.
    pub async fn resolve_destination(
        &self,
        icao24: &str,
        callsign: &str,
    ) -> Result<Option<LonLat>, ClientError> {
        let route = self.api.route(callsign).await?;
        let destination = route
            .destination
            .map(|airport| LonLat::new(airport.longitude, airport.latitude));

        if let Some(point) = destination {
            self.selection.send_if_modified(|current| {
                if current.icao24.as_deref() != Some(icao24) {
                    return false;
                }
                current.destination = Some(point);
                true
            });
        }
        Ok(destination)
    }

    pub fn state(&self) -> FlightDataState {
        self.poller.state()
    }

    pub fn latest_frame(&self) -> Arc<RenderFrame> {
        self.engine.latest()
    }

    pub fn frames(&self) -> watch::Receiver<Arc<RenderFrame>> {
        self.engine.subscribe()
    }

    /// Stop every loop and wait for them.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.watcher.await {
            warn!(error = %e, "selection watcher task failed");
        }
        self.engine.shutdown().await;
        self.poller.shutdown().await;
        match Arc::try_unwrap(self.tracker) {
            Ok(tracker) => tracker.shutdown().await,
            Err(_) => warn!("flight tracker still shared at shutdown"),
        }
    }
}

/// Point the tracker at the selected aircraft whenever it is missing from the
/// bulk snapshot.
async fn watch_selection(
    mut snapshots: watch::Receiver<FlightDataState>,
    mut selection: watch::Receiver<SelectionInput>,
    tracker: Arc<TrackerHandle>,
    cancel: CancellationToken,
) {
    loop {
        let target = {
            let selected = selection.borrow_and_update();
            let state = snapshots.borrow_and_update();
            tracking_target(selected.icao24.as_deref(), &state.current)
        };
        debug!(icao24 = ?target, "tracking target");
        tracker.track(target);

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => if changed.is_err() { break },
            changed = selection.changed() => if changed.is_err() { break },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedFlightApi;
    use crate::clock::ManualClock;
    use crate::flight::tests::sample_flight;
    use crate::flight::{FlightResponse, FlightsResponse};
    use crate::provider::MockAsyncHttpClient;
    use std::time::Duration;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_build_state_uses_configured_cache() {
        let mut config = ConfigFile::default();
        config.cache.ttl_ms = 2_000;
        let state = build_state_with(
            Arc::new(MockAsyncHttpClient::new()),
            None,
            Arc::new(ManualClock::new(T0)),
            &config,
        );
        assert_eq!(state.flights.config().cache.ttl_ms, 2_000);
        assert!(!state.flights.credentials().is_configured());
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_tracks_selection_missing_from_bulk() {
        let api = Arc::new(ScriptedFlightApi::new());
        api.push_flights(Ok(FlightsResponse::new(
            vec![sample_flight("aaaaaa", 50.0, 8.0)],
            T0,
        )));
        api.push_flight(Ok(FlightResponse::found(
            sample_flight("cccccc", 60.0, 20.0),
            T0,
        )));

        let clock = Arc::new(ManualClock::new(T0));
        let viewer = Viewer::spawn(
            Arc::clone(&api),
            clock,
            &ConfigFile::default(),
            BoundingBox::default(),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(viewer.state().current.len(), 1);
        assert!(api.single_calls().is_empty());

        // Selecting an aircraft that is in the snapshot needs no tracking.
        viewer.select(Some("aaaaaa".to_string()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(api.single_calls().is_empty());
        assert!(viewer.latest_frame().selected.is_some());

        viewer.select(Some("cccccc".to_string()));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(api.single_calls(), vec!["cccccc".to_string()]);

        let frame = viewer.latest_frame();
        assert_eq!(frame.aircraft.len(), 2);
        assert!(frame.marker("cccccc").is_some_and(|m| m.selected));

        viewer.shutdown().await;
    }
}
