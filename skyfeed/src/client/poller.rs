//! Viewport poll loop.
//!
//! One [`FlightPoller`] task per viewport is the only code path that fetches
//! bulk data. Scheduling decisions live in the synchronous [`PollScheduler`] so
//! they can be tested without a runtime; the task only wires it to a timer, the
//! in-flight request and the bounds channel.
//!
//! ```text
//!   bounds (watch) ──► on_bounds_change ──┐
//!                                         ▼
//!   timer ─────────► on_timer ──────► Fetch / Reschedule / Keep
//!                                         │
//!   FlightApi::flights ◄──────────────────┘
//!          │
//!          ▼
//!   FlightDataState::apply_* ──► on_result ──► next delay
//!          │
//!          ▼
//!   state (watch) ──► interpolation engine, CLI
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::{ClientError, FlightApi};
use crate::clock::Clock;
use crate::flight::{Flight, FlightsResponse};
use crate::geo::BoundingBox;

/// Interval between successful polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Delay after a failed poll without a server hint.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Minimum spacing between a bounds-triggered fetch and the previous attempt.
pub const BOUNDS_FETCH_COOLDOWN: Duration = Duration::from_millis(2_500);

/// Delay applied when the timer fires while a fetch is still running.
pub const IN_FLIGHT_POLL_DELAY: Duration = Duration::from_millis(250);

/// Upper bound on any server-provided retry hint.
pub const MAX_RATE_LIMIT_RETRY: Duration = Duration::from_secs(60);

/// Delay before the first fetch, letting the viewport settle.
pub const INITIAL_POLL_DELAY: Duration = Duration::from_millis(500);

/// Smallest edge movement in degrees that counts as a new viewport.
pub const MIN_BOUNDS_DELTA: f64 = 0.01;

/// Poll loop timing.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub bounds_cooldown: Duration,
    pub in_flight_delay: Duration,
    pub max_rate_limit_retry: Duration,
    pub initial_delay: Duration,
    pub min_bounds_delta: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            retry_delay: RETRY_DELAY,
            bounds_cooldown: BOUNDS_FETCH_COOLDOWN,
            in_flight_delay: IN_FLIGHT_POLL_DELAY,
            max_rate_limit_retry: MAX_RATE_LIMIT_RETRY,
            initial_delay: INITIAL_POLL_DELAY,
            min_bounds_delta: MIN_BOUNDS_DELTA,
        }
    }
}

impl PollerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

// ============================================================================
// Published state
// ============================================================================

/// Connection indicator derived from the last poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No snapshot received yet.
    #[default]
    Connecting,
    /// Last poll returned data.
    Live,
    /// A snapshot exists but the last poll failed or was degraded.
    Reconnecting,
    /// The server reported the upstream as rate limited.
    RateLimited,
}

/// Snapshot state published by the poll loop.
///
/// Failures never blank a snapshot that already exists; they only set `error`
/// and `connection`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightDataState {
    pub current: Arc<Vec<Flight>>,
    /// Snapshot before `current` (equal to it after the first poll).
    pub previous: Arc<Vec<Flight>>,
    /// Epoch milliseconds when `current` was received; 0 before the first.
    pub last_update_ms: i64,
    pub error: Option<String>,
    pub is_loading: bool,
    pub connection: ConnectionStatus,
}

impl Default for FlightDataState {
    fn default() -> Self {
        Self {
            current: Arc::default(),
            previous: Arc::default(),
            last_update_ms: 0,
            error: None,
            is_loading: true,
            connection: ConnectionStatus::Connecting,
        }
    }
}

impl FlightDataState {
    /// Fold a server answer into the state and classify it for scheduling.
    pub fn apply_response(
        &mut self,
        response: FlightsResponse,
        now_ms: i64,
        max_retry: Duration,
    ) -> PollResult {
        let rate_limited = response.is_rate_limited();
        let retry_after = response
            .retry_after_seconds
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs).min(max_retry));

        if response.error.is_some() && response.flights.is_empty() {
            let has_snapshot = !self.current.is_empty();
            self.error = match (has_snapshot, rate_limited) {
                (true, _) => None,
                (false, true) => Some("Rate limited, waiting...".to_string()),
                (false, false) => Some("Connecting...".to_string()),
            };
            self.is_loading = !has_snapshot;
            self.connection = if rate_limited {
                ConnectionStatus::RateLimited
            } else if has_snapshot {
                ConnectionStatus::Reconnecting
            } else {
                ConnectionStatus::Connecting
            };
            return PollResult::Failed {
                retry_after,
                rate_limited,
            };
        }

        let degraded = response.error.is_some();
        let flights = Arc::new(response.flights);
        self.previous = if self.current.is_empty() {
            Arc::clone(&flights)
        } else {
            std::mem::take(&mut self.current)
        };
        self.current = flights;
        self.last_update_ms = now_ms;
        self.error = None;
        self.is_loading = false;
        self.connection = match (rate_limited, degraded) {
            (true, _) => ConnectionStatus::RateLimited,
            (false, true) => ConnectionStatus::Reconnecting,
            (false, false) => ConnectionStatus::Live,
        };

        if rate_limited {
            PollResult::Failed {
                retry_after,
                rate_limited,
            }
        } else {
            PollResult::Updated
        }
    }

    /// Record a transport failure.
    pub fn apply_error(&mut self, error: &ClientError) -> PollResult {
        self.error = Some(error.to_string());
        self.is_loading = false;
        self.connection = if self.current.is_empty() {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting
        };
        PollResult::Failed {
            retry_after: None,
            rate_limited: false,
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// What the loop should do with its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    /// Cancel the timer and fetch now.
    Fetch,
    /// Re-arm the timer to fire after the given delay.
    Reschedule(Duration),
    /// Leave the timer alone.
    Keep,
}

/// Classification of one completed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Updated,
    Failed {
        /// Server hint, already capped.
        retry_after: Option<Duration>,
        rate_limited: bool,
    },
}

/// Timing state machine of the poll loop.
#[derive(Debug)]
pub struct PollScheduler {
    config: PollerConfig,
    bounds: BoundingBox,
    in_flight: bool,
    pending_refresh: bool,
    last_attempt: Option<Instant>,
    rate_limited_until: Option<Instant>,
}

impl PollScheduler {
    pub fn new(config: PollerConfig, bounds: BoundingBox) -> Self {
        Self {
            config,
            bounds,
            in_flight: false,
            pending_refresh: false,
            last_attempt: None,
            rate_limited_until: None,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        self.config.initial_delay
    }

    /// Viewport the next fetch will request.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn has_pending_refresh(&self) -> bool {
        self.pending_refresh
    }

    pub fn rate_limited_until(&self) -> Option<Instant> {
        self.rate_limited_until
    }

    /// The poll timer fired.
    pub fn on_timer(&mut self, _now: Instant) -> PollAction {
        if self.in_flight {
            PollAction::Reschedule(self.config.in_flight_delay)
        } else {
            PollAction::Fetch
        }
    }

    /// A fetch is about to start.
    pub fn begin_fetch(&mut self, now: Instant) {
        self.in_flight = true;
        self.last_attempt = Some(now);
    }

    /// The viewport changed.
    ///
    /// An in-flight bulk fetch is never abandoned here: its answer is still
    /// applied and the new bounds are fetched once it returns. The selected
    /// aircraft tracker does the opposite and aborts on a selection change.
    pub fn on_bounds_change(&mut self, bounds: BoundingBox, now: Instant) -> PollAction {
        if !bounds.differs_from(&self.bounds, self.config.min_bounds_delta) {
            return PollAction::Keep;
        }
        self.bounds = bounds;
        self.pending_refresh = true;

        if let Some(until) = self.rate_limited_until.filter(|until| *until > now) {
            let wait = (until - now).min(self.config.max_rate_limit_retry);
            return PollAction::Reschedule(wait);
        }

        let since_last = self.last_attempt.map(|last| now.saturating_duration_since(last));
        match since_last {
            Some(since) if since < self.config.bounds_cooldown => {
                if self.in_flight {
                    // The pending refresh fires as soon as the fetch returns.
                    PollAction::Keep
                } else {
                    PollAction::Reschedule(self.config.bounds_cooldown - since)
                }
            }
            _ if self.in_flight => PollAction::Keep,
            _ => PollAction::Fetch,
        }
    }

    /// A fetch finished; returns the delay until the next one.
    pub fn on_result(&mut self, result: PollResult, now: Instant) -> Duration {
        self.in_flight = false;

        match result {
            PollResult::Updated => self.rate_limited_until = None,
            PollResult::Failed {
                retry_after: Some(delay),
                rate_limited: true,
            } => self.rate_limited_until = Some(now + delay),
            PollResult::Failed { .. } => {}
        }

        if std::mem::take(&mut self.pending_refresh) {
            return Duration::ZERO;
        }
        match result {
            PollResult::Updated => self.config.poll_interval,
            PollResult::Failed { retry_after, .. } => {
                retry_after.unwrap_or(self.config.retry_delay)
            }
        }
    }
}

// ============================================================================
// Poll task
// ============================================================================

pub(super) type BoxedFetch<T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send>>;

/// Resolves with the in-flight fetch, or never when there is none.
pub(super) async fn in_flight<T>(fetch: &mut Option<BoxedFetch<T>>) -> Result<T, ClientError> {
    match fetch {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

/// Handle to a running [`FlightPoller`].
pub struct PollerHandle {
    bounds: watch::Sender<BoundingBox>,
    state: watch::Receiver<FlightDataState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Move the viewport.
    pub fn set_bounds(&self, bounds: BoundingBox) {
        self.bounds.send_replace(bounds);
    }

    /// Latest published state.
    pub fn state(&self) -> FlightDataState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlightDataState> {
        self.state.clone()
    }

    /// Stop the loop, aborting any in-flight request, and wait for it.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "flight poller task failed");
        }
    }
}

/// Self-rescheduling bulk poll loop for one viewport.
pub struct FlightPoller<A> {
    api: Arc<A>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
}

impl<A: FlightApi + 'static> FlightPoller<A> {
    pub fn new(api: Arc<A>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            config: PollerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawn the loop on the current runtime.
    ///
    /// The loop also stops when `cancel` (or a parent token) is cancelled.
    pub fn spawn(self, bounds: BoundingBox, cancel: CancellationToken) -> PollerHandle {
        let (bounds_tx, bounds_rx) = watch::channel(bounds);
        let (state_tx, state_rx) = watch::channel(FlightDataState::default());
        let task = tokio::spawn(self.run(bounds_rx, state_tx, cancel.clone()));
        PollerHandle {
            bounds: bounds_tx,
            state: state_rx,
            cancel,
            task,
        }
    }

    /// Run the loop until `cancel` fires.
    pub async fn run(
        self,
        mut bounds_rx: watch::Receiver<BoundingBox>,
        state_tx: watch::Sender<FlightDataState>,
        cancel: CancellationToken,
    ) {
        let mut scheduler = PollScheduler::new(self.config.clone(), *bounds_rx.borrow_and_update());
        let timer = sleep(scheduler.initial_delay());
        tokio::pin!(timer);
        let mut timer_armed = true;
        let mut fetch: Option<BoxedFetch<FlightsResponse>> = None;
        let mut bounds_open = true;

        info!(bounds = %scheduler.bounds(), "flight poller started");

        loop {
            let action = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                result = in_flight(&mut fetch) => {
                    fetch = None;
                    let now_ms = self.clock.now_millis();
                    let max_retry = self.config.max_rate_limit_retry;
                    let mut poll = PollResult::Updated;
                    state_tx.send_modify(|state| {
                        poll = match result {
                            Ok(response) => state.apply_response(response, now_ms, max_retry),
                            Err(e) => {
                                warn!(error = %e, "flight poll failed");
                                state.apply_error(&e)
                            }
                        };
                    });
                    let delay = scheduler.on_result(poll, Instant::now());
                    debug!(?poll, delay_ms = delay.as_millis() as u64, "next flight poll scheduled");
                    PollAction::Reschedule(delay)
                }

                changed = bounds_rx.changed(), if bounds_open => {
                    if changed.is_ok() {
                        let bounds = *bounds_rx.borrow_and_update();
                        let action = scheduler.on_bounds_change(bounds, Instant::now());
                        debug!(bounds = %bounds, ?action, "viewport changed");
                        action
                    } else {
                        bounds_open = false;
                        PollAction::Keep
                    }
                }

                _ = &mut timer, if timer_armed => {
                    timer_armed = false;
                    scheduler.on_timer(Instant::now())
                }
            };

            match action {
                PollAction::Fetch => {
                    timer_armed = false;
                    scheduler.begin_fetch(Instant::now());
                    let api = Arc::clone(&self.api);
                    let bounds = scheduler.bounds();
                    fetch = Some(Box::pin(async move { api.flights(bounds).await }));
                }
                PollAction::Reschedule(delay) => {
                    timer.as_mut().reset(Instant::now() + delay);
                    timer_armed = true;
                }
                PollAction::Keep => {}
            }
        }

        info!("flight poller stopped");
    }
}
