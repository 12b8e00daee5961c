//! Polling client.
//!
//! Everything a viewer runs: the bulk [`FlightPoller`] for its viewport, the
//! [`SelectedFlightTracker`] for one selected aircraft and the
//! [`PositionHistory`] behind the flown trail. All of it talks to the flight
//! service through [`FlightApi`].

mod api;
mod history;
mod poller;
mod tracking;

pub use api::{
    ClientError, FlightApi, HttpFlightApi, LocalFlightApi, DEFAULT_CLIENT_TIMEOUT,
    DEFAULT_SERVER_URL,
};
pub use history::{
    HistoryConfig, PositionHistory, MAX_HISTORY_AGE_MS, MIN_MOVEMENT_DEG,
};
pub use poller::{
    ConnectionStatus, FlightDataState, FlightPoller, PollAction, PollResult, PollScheduler,
    PollerConfig, PollerHandle, BOUNDS_FETCH_COOLDOWN, INITIAL_POLL_DELAY, IN_FLIGHT_POLL_DELAY,
    MAX_RATE_LIMIT_RETRY, MIN_BOUNDS_DELTA, POLL_INTERVAL, RETRY_DELAY,
};
pub use tracking::{
    merge_tracked, tracking_target, SelectedFlightTracker, TrackedFlightState, TrackerHandle,
    FAST_POLL_INTERVAL, RETRY_POLL_INTERVAL,
};

#[cfg(test)]
pub use api::tests::ScriptedFlightApi;
