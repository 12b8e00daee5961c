//! Fast polling of the selected aircraft.
//!
//! The bulk snapshot refreshes every few seconds and may not contain the
//! selected aircraft at all (it flew out of view, or the region answer is a
//! stale fallback). While that is the case the tracker polls the single
//! aircraft endpoint on its own, faster schedule and the result is merged into
//! the flights handed to the interpolation engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::FlightApi;
use super::poller::{in_flight, BoxedFetch, MAX_RATE_LIMIT_RETRY};
use crate::clock::Clock;
use crate::flight::{Flight, FlightResponse};

/// Interval between successful single-aircraft polls.
pub const FAST_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Delay after an unsuccessful poll without a server hint.
pub const RETRY_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Latest fast-polled data for the selected aircraft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedFlightState {
    /// Aircraft being tracked, if any.
    pub icao24: Option<String>,
    pub flight: Option<Flight>,
    /// Epoch milliseconds of the last successful poll.
    pub last_update_ms: i64,
}

/// The aircraft that needs dedicated polling, if any.
///
/// Only a selected aircraft missing from the bulk snapshot is tracked.
pub fn tracking_target(selected: Option<&str>, bulk: &[Flight]) -> Option<String> {
    let selected = selected?;
    (!bulk.iter().any(|f| f.icao24 == selected)).then(|| selected.to_string())
}

/// Substitute or append the tracked aircraft into the bulk snapshot.
pub fn merge_tracked(bulk: &[Flight], tracked: Option<&Flight>) -> Vec<Flight> {
    let mut merged = bulk.to_vec();
    if let Some(tracked) = tracked {
        match merged.iter_mut().find(|f| f.icao24 == tracked.icao24) {
            Some(slot) => *slot = tracked.clone(),
            None => merged.push(tracked.clone()),
        }
    }
    merged
}

/// Delay until the next poll after `response`, `None` meaning success.
fn next_delay(response: &FlightResponse, retry: Duration) -> Option<Duration> {
    if response.flight.is_some() {
        return None;
    }
    let hinted = response
        .retry_after_seconds
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs).min(MAX_RATE_LIMIT_RETRY));
    Some(hinted.unwrap_or(retry))
}

/// Handle to a running [`SelectedFlightTracker`].
pub struct TrackerHandle {
    selection: watch::Sender<Option<String>>,
    state: watch::Receiver<TrackedFlightState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    /// Track `icao24`, or stop tracking with `None`.
    ///
    /// Changing the target aborts the in-flight request and clears the
    /// tracked flight.
    pub fn track(&self, icao24: Option<String>) {
        self.selection.send_if_modified(|current| {
            if *current == icao24 {
                false
            } else {
                *current = icao24;
                true
            }
        });
    }

    pub fn state(&self) -> TrackedFlightState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackedFlightState> {
        self.state.clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "flight tracker task failed");
        }
    }
}

/// Dedicated poll loop for one selected aircraft.
pub struct SelectedFlightTracker<A> {
    api: Arc<A>,
    clock: Arc<dyn Clock>,
    fast_interval: Duration,
    retry_interval: Duration,
}

impl<A: FlightApi + 'static> SelectedFlightTracker<A> {
    pub fn new(api: Arc<A>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            fast_interval: FAST_POLL_INTERVAL,
            retry_interval: RETRY_POLL_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, fast: Duration, retry: Duration) -> Self {
        self.fast_interval = fast;
        self.retry_interval = retry;
        self
    }

    pub fn spawn(self, cancel: CancellationToken) -> TrackerHandle {
        let (selection_tx, selection_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(TrackedFlightState::default());
        let task = tokio::spawn(self.run(selection_rx, state_tx, cancel.clone()));
        TrackerHandle {
            selection: selection_tx,
            state: state_rx,
            cancel,
            task,
        }
    }

    pub async fn run(
        self,
        mut selection_rx: watch::Receiver<Option<String>>,
        state_tx: watch::Sender<TrackedFlightState>,
        cancel: CancellationToken,
    ) {
        let timer = sleep(Duration::ZERO);
        tokio::pin!(timer);
        let mut timer_armed = false;
        let mut fetch: Option<BoxedFetch<FlightResponse>> = None;
        let mut target: Option<String> = None;
        let mut selection_open = true;

        loop {
            let start_fetch = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                result = in_flight(&mut fetch) => {
                    fetch = None;
                    let delay = match result {
                        Ok(response) => {
                            let delay = next_delay(&response, self.retry_interval);
                            if let Some(flight) = response.flight {
                                let now_ms = self.clock.now_millis();
                                state_tx.send_modify(|state| {
                                    state.flight = Some(flight);
                                    state.last_update_ms = now_ms;
                                });
                            }
                            delay.unwrap_or(self.fast_interval)
                        }
                        Err(e) => {
                            warn!(icao24 = ?target, error = %e, "tracked flight poll failed");
                            self.retry_interval
                        }
                    };
                    debug!(icao24 = ?target, delay_ms = delay.as_millis() as u64, "next tracked poll scheduled");
                    timer.as_mut().reset(Instant::now() + delay);
                    timer_armed = true;
                    false
                }

                changed = selection_rx.changed(), if selection_open => {
                    if changed.is_ok() {
                        target = selection_rx.borrow_and_update().clone();
                        fetch = None;
                        timer_armed = false;
                        state_tx.send_replace(TrackedFlightState {
                            icao24: target.clone(),
                            ..Default::default()
                        });
                        debug!(icao24 = ?target, "tracking target changed");
                        target.is_some()
                    } else {
                        selection_open = false;
                        false
                    }
                }

                _ = &mut timer, if timer_armed => {
                    timer_armed = false;
                    target.is_some()
                }
            };

            if let (true, Some(icao24)) = (start_fetch, target.clone()) {
                let api = Arc::clone(&self.api);
                fetch = Some(Box::pin(async move { api.flight(&icao24).await }));
            }
        }

        info!("flight tracker stopped");
    }
}
