//! Fixed-rate animation loop.
//!
//! The engine ticks at a fixed frame rate, reads whatever the poll loop and the
//! tracker last published, and publishes a fresh [`RenderFrame`]. It never
//! awaits anything but its own tick, so a slow or failing upstream only ever
//! shows up as aircraft coasting on their last known kinematics.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use super::frame::{render_frame, RenderFrame, Selection};
use crate::client::{merge_tracked, FlightDataState, PositionHistory, TrackedFlightState};
use crate::clock::Clock;
use crate::flight::Flight;
use crate::geo::LonLat;

/// Default animation rate.
pub const DEFAULT_FPS: u32 = 30;

/// The viewer's current selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionInput {
    pub icao24: Option<String>,
    /// Destination airport of the selected aircraft's route, if known.
    pub destination: Option<LonLat>,
}

impl SelectionInput {
    pub fn aircraft(icao24: impl Into<String>) -> Self {
        Self {
            icao24: Some(icao24.into()),
            destination: None,
        }
    }

    pub fn with_destination(mut self, destination: LonLat) -> Self {
        self.destination = Some(destination);
        self
    }
}

/// Dead-reckoning engine state.
pub struct InterpolationEngine {
    clock: Arc<dyn Clock>,
    fps: u32,
    history: PositionHistory,
    flights: Arc<Vec<Flight>>,
    batch_ms: i64,
    tracked: Option<Flight>,
    selection: SelectionInput,
}

impl InterpolationEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            fps: DEFAULT_FPS,
            history: PositionHistory::new(),
            flights: Arc::default(),
            batch_ms: 0,
            tracked: None,
            selection: SelectionInput::default(),
        }
    }

    /// Frames per second; 0 is treated as 1.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps
    }

    pub fn history(&self) -> &PositionHistory {
        &self.history
    }

    /// Take a new bulk snapshot from the poll loop.
    pub fn on_snapshot(&mut self, state: &FlightDataState) {
        if state.last_update_ms == self.batch_ms && Arc::ptr_eq(&state.current, &self.flights) {
            return;
        }
        self.flights = Arc::clone(&state.current);
        self.batch_ms = state.last_update_ms;
        self.history.update(&self.flights, self.clock.now_millis());
    }

    /// Take the tracker's latest answer for the selected aircraft.
    pub fn on_tracked(&mut self, state: &TrackedFlightState) {
        if let Some(flight) = &state.flight {
            self.history.add_position(flight, self.clock.now_millis());
        }
        self.tracked = state.flight.clone();
    }

    pub fn set_selection(&mut self, selection: SelectionInput) {
        self.selection = selection;
    }

    /// Compute the frame for the current instant.
    pub fn frame(&self) -> RenderFrame {
        let now_ms = self.clock.now_millis();
        let tracked = self
            .tracked
            .as_ref()
            .filter(|t| self.selection.icao24.as_deref() == Some(t.icao24.as_str()));
        let flights = merge_tracked(&self.flights, tracked);

        let trail;
        let selection = match self.selection.icao24.as_deref() {
            Some(icao24) => {
                trail = self.history.trail(icao24);
                Some(Selection {
                    icao24,
                    trail: &trail,
                    destination: self.selection.destination,
                })
            }
            None => None,
        };

        render_frame(&flights, self.batch_ms, now_ms, selection.as_ref())
    }

    /// Spawn the animation loop.
    pub fn spawn(
        self,
        snapshots: watch::Receiver<FlightDataState>,
        tracked: watch::Receiver<TrackedFlightState>,
        selection: watch::Receiver<SelectionInput>,
        cancel: CancellationToken,
    ) -> EngineHandle {
        let (frame_tx, frame_rx) = watch::channel(Arc::new(RenderFrame::default()));
        let task = tokio::spawn(self.run(snapshots, tracked, selection, frame_tx, cancel.clone()));
        EngineHandle {
            frames: frame_rx,
            cancel,
            task,
        }
    }

    /// Tick until `cancel` fires, publishing one frame per tick.
    pub async fn run(
        mut self,
        mut snapshots: watch::Receiver<FlightDataState>,
        mut tracked: watch::Receiver<TrackedFlightState>,
        mut selection: watch::Receiver<SelectionInput>,
        frames: watch::Sender<Arc<RenderFrame>>,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(self.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(fps = self.fps, "interpolation engine started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    if selection.has_changed().unwrap_or(false) {
                        let next = selection.borrow_and_update().clone();
                        self.set_selection(next);
                    }
                    if snapshots.has_changed().unwrap_or(false) {
                        let state = snapshots.borrow_and_update().clone();
                        self.on_snapshot(&state);
                    }
                    if tracked.has_changed().unwrap_or(false) {
                        let state = tracked.borrow_and_update().clone();
                        self.on_tracked(&state);
                    }

                    let frame = self.frame();
                    trace!(aircraft = frame.aircraft.len(), "frame");
                    frames.send_replace(Arc::new(frame));
                }
            }
        }

        info!("interpolation engine stopped");
    }
}

/// Handle to a running engine.
pub struct EngineHandle {
    frames: watch::Receiver<Arc<RenderFrame>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Most recent frame.
    pub fn latest(&self) -> Arc<RenderFrame> {
        Arc::clone(&self.frames.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RenderFrame>> {
        self.frames.clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "interpolation engine task failed");
        }
    }
}
