//! Upstream fetch orchestration.
//!
//! [`FlightService`] answers bulk (bounding box) and single-aircraft queries.
//! Every request walks the same decision ladder:
//!
//! ```text
//! fresh cache hit ──────────────────────────────► serve (no network)
//! backing off ──► fallback (labelled) ──────────► else 429
//! fetch ─┬─ 429 ──► extend backoff ──► fallback ► else 429
//!        ├─ non-2xx ──────────────────► fallback ► else 502
//!        ├─ malformed body ───────────► fallback ► else 502
//!        ├─ network / timeout ────────► fallback ► else 500
//!        └─ ok ──► clear backoff, normalise, store, serve
//! ```
//!
//! No branch returns an error to the caller: every answer is a labelled body
//! plus a [`FetchOutcome`] from which the HTTP layer derives the status.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::outcome::{DegradedReason, FetchOutcome, Served};
use super::rate_limit::RateLimitState;
use crate::cache::{AircraftCache, CacheConfig, CacheStats, RegionCache, RegionEntry};
use crate::clock::Clock;
use crate::flight::{FlightResponse, FlightsResponse};
use crate::geo::BoundingBox;
use crate::provider::opensky::{self, DEFAULT_STATES_URL};
use crate::provider::{
    rate_limit_delay_ms, with_deadline, AsyncHttpClient, CredentialCache, HttpResponse,
    ProviderError,
};

/// Timeout for bounding box queries.
pub const DEFAULT_BULK_TIMEOUT: Duration = Duration::from_secs(8);

/// Timeout for single-aircraft queries.
pub const DEFAULT_SINGLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error label when a 2xx body cannot be decoded.
pub const MALFORMED_PAYLOAD: &str = "Malformed upstream payload";

/// Upstream endpoint and timing for a [`FlightService`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlightServiceConfig {
    pub states_url: String,
    pub bulk_timeout: Duration,
    pub single_timeout: Duration,
    pub cache: CacheConfig,
}

impl Default for FlightServiceConfig {
    fn default() -> Self {
        Self {
            states_url: DEFAULT_STATES_URL.to_string(),
            bulk_timeout: DEFAULT_BULK_TIMEOUT,
            single_timeout: DEFAULT_SINGLE_TIMEOUT,
            cache: CacheConfig::default(),
        }
    }
}

impl FlightServiceConfig {
    pub fn with_states_url(mut self, url: impl Into<String>) -> Self {
        self.states_url = url.into();
        self
    }

    pub fn with_bulk_timeout(mut self, timeout: Duration) -> Self {
        self.bulk_timeout = timeout;
        self
    }

    pub fn with_single_timeout(mut self, timeout: Duration) -> Self {
        self.single_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// Rejected transponder address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IcaoError {
    #[error("Missing icao24 parameter")]
    Missing,
    #[error("Invalid icao24 parameter")]
    Invalid,
}

fn icao_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-f]{6}$").expect("static icao24 pattern"))
}

/// Trim and lowercase a transponder address, requiring six hex digits.
pub fn normalize_icao24(raw: &str) -> Result<String, IcaoError> {
    let icao24 = raw.trim().to_ascii_lowercase();
    if icao24.is_empty() {
        return Err(IcaoError::Missing);
    }
    if !icao_pattern().is_match(&icao24) {
        return Err(IcaoError::Invalid);
    }
    Ok(icao24)
}

/// Counters across both caches and the token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    pub regions: CacheStats,
    pub aircraft: CacheStats,
    pub token_exchanges: u64,
}

/// Caching, backoff-aware front for the OpenSky state vector API.
pub struct FlightService<C> {
    client: Arc<C>,
    credentials: CredentialCache<C>,
    regions: RegionCache,
    aircraft: AircraftCache,
    rate_limit: RateLimitState,
    clock: Arc<dyn Clock>,
    config: FlightServiceConfig,
}

impl<C: AsyncHttpClient + 'static> FlightService<C> {
    pub fn new(
        client: Arc<C>,
        credentials: CredentialCache<C>,
        clock: Arc<dyn Clock>,
        config: FlightServiceConfig,
    ) -> Self {
        Self {
            client,
            credentials,
            regions: RegionCache::new(config.cache.clone()),
            aircraft: AircraftCache::new(&config.cache),
            rate_limit: RateLimitState::new(),
            clock,
            config,
        }
    }

    pub fn region_cache(&self) -> &RegionCache {
        &self.regions
    }

    pub fn aircraft_cache(&self) -> &AircraftCache {
        &self.aircraft
    }

    pub fn rate_limit(&self) -> &RateLimitState {
        &self.rate_limit
    }

    pub fn credentials(&self) -> &CredentialCache<C> {
        &self.credentials
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            regions: self.regions.stats(),
            aircraft: self.aircraft.stats(),
            token_exchanges: self.credentials.exchange_count(),
        }
    }

    pub fn config(&self) -> &FlightServiceConfig {
        &self.config
    }

    /// Service clock reading, epoch ms.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// All aircraft inside `bounds`.
    pub async fn flights(&self, bounds: BoundingBox) -> Served<FlightsResponse> {
        let key = self.regions.key_for(&bounds);
        let exact = self.regions.get(&key);
        let now = self.clock.now_millis();

        if let Some(response) = self.regions.fresh(exact.as_ref(), &bounds, now) {
            return Served::new(response, FetchOutcome::CacheHit);
        }

        if self.rate_limit.is_limited_at(now) {
            debug!(bounds = %bounds, until = self.rate_limit.until(), "backing off, upstream skipped");
            return self.rate_limited_flights(&bounds, now, exact.as_ref());
        }

        let url = opensky::bounds_url(&self.config.states_url, &bounds);
        let response = match self.upstream_get(&url, self.config.bulk_timeout).await {
            Ok(response) => response,
            Err(e) => {
                warn!(bounds = %bounds, error = %e, "upstream request failed");
                return self
                    .region_fallback(&bounds, now, exact.as_ref(), DegradedReason::Network)
                    .unwrap_or_else(|| {
                        Served::new(
                            FlightsResponse::empty(now, e.to_string()),
                            FetchOutcome::NetworkFailed,
                        )
                    });
            }
        };

        if response.status == 429 {
            let until = self
                .rate_limit
                .extend(now, rate_limit_delay_ms(&response, now));
            warn!(bounds = %bounds, until, "upstream rate limit hit");
            return self.rate_limited_flights(&bounds, now, exact.as_ref());
        }

        if !response.is_success() {
            let status = response.status;
            warn!(bounds = %bounds, status, "upstream returned error status");
            return self
                .region_fallback(&bounds, now, exact.as_ref(), DegradedReason::Upstream(status))
                .unwrap_or_else(|| {
                    Served::new(
                        FlightsResponse::empty(now, format!("API error: {}", status)),
                        FetchOutcome::UpstreamFailed(status),
                    )
                });
        }

        self.rate_limit.clear();

        let Some(snapshot) = opensky::parse_snapshot_bytes(&response.body) else {
            warn!(bounds = %bounds, bytes = response.body.len(), "malformed upstream payload");
            return self
                .region_fallback(&bounds, now, exact.as_ref(), DegradedReason::Malformed)
                .unwrap_or_else(|| {
                    Served::new(
                        FlightsResponse::empty(now, MALFORMED_PAYLOAD),
                        FetchOutcome::UpstreamFailed(response.status),
                    )
                });
        };

        let flights = snapshot.flights();
        let timestamp = snapshot
            .as_of
            .map(|secs| (secs * 1000.0) as i64)
            .filter(|ms| *ms != 0)
            .unwrap_or(now);
        debug!(
            bounds = %bounds,
            records = snapshot.records.len(),
            flights = flights.len(),
            "fetched upstream snapshot"
        );

        // Upstream filtering is approximate; answer only what the box contains.
        let entry = RegionEntry::new(flights, timestamp, bounds, now);
        let body = entry.filtered(&bounds);
        self.regions.put(key, entry);
        self.regions.prune(now);

        Served::new(body, FetchOutcome::Live)
    }

    /// One aircraft by transponder address.
    pub async fn flight(&self, raw_icao24: &str) -> Served<FlightResponse> {
        let icao24 = match normalize_icao24(raw_icao24) {
            Ok(icao24) => icao24,
            Err(e) => {
                return Served::new(FlightResponse::missing(e.to_string()), FetchOutcome::Invalid)
            }
        };
        let now = self.clock.now_millis();

        if let Some(entry) = self.aircraft.fresh(&icao24, now) {
            return Served::new(
                FlightResponse::found(entry.flight, entry.timestamp),
                FetchOutcome::CacheHit,
            );
        }

        if self.rate_limit.is_limited_at(now) {
            debug!(icao24 = %icao24, "backing off, upstream skipped");
            return self.rate_limited_flight(&icao24, now);
        }

        let url = opensky::icao_url(&self.config.states_url, &icao24);
        let response = match self.upstream_get(&url, self.config.single_timeout).await {
            Ok(response) => response,
            Err(e) => {
                warn!(icao24 = %icao24, error = %e, "upstream request failed");
                return self
                    .aircraft_fallback(&icao24, now, DegradedReason::Network)
                    .unwrap_or_else(|| {
                        Served::new(
                            FlightResponse::missing(e.to_string()),
                            FetchOutcome::NetworkFailed,
                        )
                    });
            }
        };

        if response.status == 429 {
            let until = self
                .rate_limit
                .extend(now, rate_limit_delay_ms(&response, now));
            warn!(icao24 = %icao24, until, "upstream rate limit hit");
            return self.rate_limited_flight(&icao24, now);
        }

        if !response.is_success() {
            let status = response.status;
            warn!(icao24 = %icao24, status, "upstream returned error status");
            return self
                .aircraft_fallback(&icao24, now, DegradedReason::Upstream(status))
                .unwrap_or_else(|| {
                    Served::new(
                        FlightResponse::missing(format!("API error: {}", status)),
                        FetchOutcome::UpstreamFailed(status),
                    )
                });
        }

        self.rate_limit.clear();

        let Some(snapshot) = opensky::parse_snapshot_bytes(&response.body) else {
            warn!(icao24 = %icao24, "malformed upstream payload");
            return self
                .aircraft_fallback(&icao24, now, DegradedReason::Malformed)
                .unwrap_or_else(|| {
                    Served::new(
                        FlightResponse::missing(MALFORMED_PAYLOAD),
                        FetchOutcome::UpstreamFailed(response.status),
                    )
                });
        };

        let Some(record) = snapshot.records.first() else {
            return Served::new(FlightResponse::missing("Aircraft not found"), FetchOutcome::NoData);
        };
        let Some(flight) = opensky::to_flight(record) else {
            return Served::new(FlightResponse::missing("No position data"), FetchOutcome::NoData);
        };

        self.aircraft.put(&icao24, flight.clone(), now);
        Served::new(FlightResponse::found(flight, now), FetchOutcome::Live)
    }

    async fn upstream_get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, ProviderError> {
        let token = self.credentials.token().await;
        with_deadline(url, timeout, self.client.get(url, token.as_deref())).await
    }

    fn region_fallback(
        &self,
        bounds: &BoundingBox,
        now: i64,
        exact: Option<&RegionEntry>,
        reason: DegradedReason,
    ) -> Option<Served<FlightsResponse>> {
        let response = self.regions.resolve_fallback(bounds, now, exact)?;
        debug!(bounds = %bounds, count = response.count, ?reason, "serving cached fallback");
        Some(Served::new(
            response.with_error(reason.label()),
            FetchOutcome::Fallback(reason),
        ))
    }

    fn rate_limited_flights(
        &self,
        bounds: &BoundingBox,
        now: i64,
        exact: Option<&RegionEntry>,
    ) -> Served<FlightsResponse> {
        let retry_after = self.rate_limit.retry_after_secs(now);
        match self.region_fallback(bounds, now, exact, DegradedReason::RateLimited) {
            Some(served) => Served::new(served.body.with_rate_limit(retry_after), served.outcome),
            None => Served::new(
                FlightsResponse::empty(now, "Rate limited").with_rate_limit(retry_after),
                FetchOutcome::RateLimited,
            ),
        }
    }

    fn aircraft_fallback(
        &self,
        icao24: &str,
        now: i64,
        reason: DegradedReason,
    ) -> Option<Served<FlightResponse>> {
        let entry = self.aircraft.fallback(icao24, now)?;
        Some(Served::new(
            FlightResponse::found(entry.flight, entry.timestamp).with_error(reason.label()),
            FetchOutcome::Fallback(reason),
        ))
    }

    fn rate_limited_flight(&self, icao24: &str, now: i64) -> Served<FlightResponse> {
        let retry_after = self.rate_limit.retry_after_secs(now);
        match self.aircraft_fallback(icao24, now, DegradedReason::RateLimited) {
            Some(served) => Served::new(served.body.with_rate_limit(retry_after), served.outcome),
            None => Served::new(
                FlightResponse::missing("Rate limited").with_rate_limit(retry_after),
                FetchOutcome::RateLimited,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::provider::{ClientCredentials, MockAsyncHttpClient};
    use serde_json::{json, Value};

    const T0: i64 = 1_700_000_000_000;

    fn state(icao24: &str, lat: f64, lon: f64) -> Value {
        json!([
            icao24, "TEST1 ", "Germany", 1_699_999_999, 1_700_000_000, lon, lat,
            10_000.0, false, 200.0, 90.0, 0.0, null, 10_100.0, "1000", false, 0, 0
        ])
    }

    fn states(time: i64, records: Vec<Value>) -> Value {
        json!({ "time": time, "states": records })
    }

    fn service(
        mock: MockAsyncHttpClient,
        clock: &Arc<ManualClock>,
    ) -> (Arc<MockAsyncHttpClient>, FlightService<MockAsyncHttpClient>) {
        let mock = Arc::new(mock);
        let credentials = CredentialCache::new(Arc::clone(&mock), None, clock.clone());
        let service = FlightService::new(
            Arc::clone(&mock),
            credentials,
            clock.clone(),
            FlightServiceConfig::default(),
        );
        (mock, service)
    }

    fn europe() -> BoundingBox {
        BoundingBox::normalized(40.0, -10.0, 50.0, 10.0)
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_network() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, states(1_700_000_000, vec![state("aaaaaa", 45.0, 0.0)]));
        let (mock, service) = service(mock, &clock);

        let first = service.flights(europe()).await;
        assert_eq!(first.outcome, FetchOutcome::Live);
        assert_eq!(first.body.count, 1);
        assert_eq!(first.body.timestamp, 1_700_000_000_000);

        clock.advance(4_999);
        let second = service.flights(europe()).await;
        assert_eq!(second.outcome, FetchOutcome::CacheHit);
        assert_eq!(second.body.flights, first.body.flights);
        assert_eq!(mock.request_count(), 1);

        let stats = service.stats();
        assert_eq!(stats.regions.hits, 1);
        assert_eq!(stats.regions.misses, 1);
        assert_eq!(stats.regions.entries, 1);
        assert_eq!(stats.aircraft.entries, 0);
        assert_eq!(stats.token_exchanges, 0);
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, states(1, vec![state("aaaaaa", 45.0, 0.0)]));
        mock.push_json(200, states(2, vec![]));
        let (mock, service) = service(mock, &clock);

        service.flights(europe()).await;
        clock.advance(5_000);
        let second = service.flights(europe()).await;
        assert_eq!(second.outcome, FetchOutcome::Live);
        assert_eq!(second.body.count, 0);
        assert_eq!(mock.request_count(), 2);
        assert!(mock.requests()[0].url.ends_with("?lamin=40&lomin=-10&lamax=50&lomax=10"));
    }

    #[tokio::test]
    async fn test_timestamp_defaults_to_now() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, json!({ "states": [state("aaaaaa", 45.0, 0.0)] }));
        let (_mock, service) = service(mock, &clock);

        assert_eq!(service.flights(europe()).await.body.timestamp, T0);
    }

    #[tokio::test]
    async fn test_rate_limit_header_then_short_circuit() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push(Ok(HttpResponse::new(
            429,
            &[("X-Rate-Limit-Retry-After-Seconds", "20")],
            Vec::new(),
        )));
        let (mock, service) = service(mock, &clock);

        let limited = service.flights(europe()).await;
        assert_eq!(limited.status_code(), 429);
        assert_eq!(limited.body.error.as_deref(), Some("Rate limited"));
        assert_eq!(limited.body.retry_after_seconds, Some(20));
        assert_eq!(service.rate_limit().until(), T0 + 20_000);

        clock.advance(10_000);
        let again = service.flights(europe()).await;
        assert_eq!(again.outcome, FetchOutcome::RateLimited);
        assert!(again.body.is_rate_limited());
        assert_eq!(again.body.retry_after_seconds, Some(10));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_serves_labelled_fallback() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, states(1_700_000_000, vec![state("aaaaaa", 45.0, 0.0)]));
        mock.push(Ok(HttpResponse::new(429, &[], Vec::new())));
        let (_mock, service) = service(mock, &clock);

        service.flights(europe()).await;
        clock.advance(6_000);
        let served = service.flights(europe()).await;

        assert_eq!(served.outcome, FetchOutcome::Fallback(DegradedReason::RateLimited));
        assert_eq!(served.status_code(), 200);
        assert_eq!(served.body.count, 1);
        assert_eq!(
            served.body.error.as_deref(),
            Some("Rate limited: serving cached data")
        );
        assert_eq!(served.body.retry_after_seconds, Some(15));
    }

    #[tokio::test]
    async fn test_upstream_error_statuses() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push(Ok(HttpResponse::new(503, &[], Vec::new())));
        mock.push_json(200, states(1, vec![state("aaaaaa", 45.0, 0.0)]));
        mock.push(Ok(HttpResponse::new(503, &[], Vec::new())));
        let (_mock, service) = service(mock, &clock);

        let failed = service.flights(europe()).await;
        assert_eq!(failed.status_code(), 502);
        assert_eq!(failed.body.error.as_deref(), Some("API error: 503"));
        assert_eq!(failed.body.count, 0);

        service.flights(europe()).await;
        clock.advance(30_000);
        let degraded = service.flights(europe()).await;
        assert_eq!(degraded.status_code(), 200);
        assert_eq!(
            degraded.body.error.as_deref(),
            Some("Upstream 503: serving cached data")
        );
        assert_eq!(degraded.body.count, 1);
        assert!(!degraded.body.is_rate_limited());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_upstream_failure() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push(Ok(HttpResponse::new(200, &[], b"<html>oops</html>".to_vec())));
        mock.push_json(200, json!({ "time": 1 }));
        let (_mock, service) = service(mock, &clock);

        let first = service.flights(europe()).await;
        assert_eq!(first.status_code(), 502);
        assert_eq!(first.body.error.as_deref(), Some(MALFORMED_PAYLOAD));

        let second = service.flights(europe()).await;
        assert_eq!(second.status_code(), 502);
        assert!(service.region_cache().is_empty());
    }

    #[tokio::test]
    async fn test_network_error() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push(Err(ProviderError::HttpError("connection refused".into())));
        mock.push_json(200, states(1, vec![state("aaaaaa", 45.0, 0.0)]));
        mock.push(Err(ProviderError::HttpError("connection reset".into())));
        let (_mock, service) = service(mock, &clock);

        let failed = service.flights(europe()).await;
        assert_eq!(failed.status_code(), 500);
        assert_eq!(
            failed.body.error.as_deref(),
            Some("request failed: connection refused")
        );

        service.flights(europe()).await;
        clock.advance(10_000);
        let degraded = service.flights(europe()).await;
        assert_eq!(degraded.outcome, FetchOutcome::Fallback(DegradedReason::Network));
        assert_eq!(
            degraded.body.error.as_deref(),
            Some("Network issue: serving cached data")
        );
    }

    #[tokio::test]
    async fn test_success_clears_backoff() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, states(1, vec![]));
        let (_mock, service) = service(mock, &clock);

        service.rate_limit().extend(T0 - 20_000, 10_000);
        service.flights(europe()).await;
        assert_eq!(service.rate_limit().until(), 0);
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = Arc::new(MockAsyncHttpClient::new());
        mock.push_json(200, json!({ "access_token": "abc", "expires_in": 1800 }));
        mock.push_json(200, states(1, vec![]));
        let credentials = CredentialCache::new(
            Arc::clone(&mock),
            Some(ClientCredentials::new("id", "secret")),
            clock.clone(),
        );
        let service = FlightService::new(
            Arc::clone(&mock),
            credentials,
            clock.clone(),
            FlightServiceConfig::default(),
        );

        service.flights(europe()).await;
        let requests = mock.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[1].bearer.as_deref(), Some("abc"));
    }

    #[test]
    fn test_normalize_icao24() {
        assert_eq!(normalize_icao24(" 3C6444 "), Ok("3c6444".to_string()));
        assert_eq!(normalize_icao24("   "), Err(IcaoError::Missing));
        assert_eq!(normalize_icao24("3c644"), Err(IcaoError::Invalid));
        assert_eq!(normalize_icao24("3c644z"), Err(IcaoError::Invalid));
        assert_eq!(normalize_icao24("3c64444"), Err(IcaoError::Invalid));
    }

    #[tokio::test]
    async fn test_single_invalid_makes_no_request() {
        let clock = Arc::new(ManualClock::new(T0));
        let (mock, service) = service(MockAsyncHttpClient::new(), &clock);

        let served = service.flight("xyz").await;
        assert_eq!(served.status_code(), 400);
        assert_eq!(served.body.error.as_deref(), Some("Invalid icao24 parameter"));
        assert_eq!(service.flight("").await.body.error.as_deref(), Some("Missing icao24 parameter"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_single_found_then_cached() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, states(1, vec![state("3c6444", 50.0, 8.0)]));
        let (mock, service) = service(mock, &clock);

        let served = service.flight(" 3C6444").await;
        assert_eq!(served.outcome, FetchOutcome::Live);
        assert_eq!(served.body.timestamp, Some(T0));
        assert!(mock.requests()[0].url.ends_with("?icao24=3c6444"));

        clock.advance(1_499);
        let cached = service.flight("3c6444").await;
        assert_eq!(cached.outcome, FetchOutcome::CacheHit);
        assert_eq!(cached.body.flight, served.body.flight);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_single_not_found_and_no_position() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, json!({ "time": 1, "states": null }));
        mock.push_json(200, states(1, vec![json!(["3c6444", "X", "DE", null, 1, null, null])]));
        let (_mock, service) = service(mock, &clock);

        let missing = service.flight("3c6444").await;
        assert_eq!(missing.outcome, FetchOutcome::NoData);
        assert_eq!(missing.body.flight, None);
        assert_eq!(missing.body.error.as_deref(), Some("Aircraft not found"));

        let no_position = service.flight("3c6444").await;
        assert_eq!(no_position.body.error.as_deref(), Some("No position data"));
        assert_eq!(no_position.status_code(), 200);
    }

    #[tokio::test]
    async fn test_single_shares_backoff_with_bulk() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push(Ok(HttpResponse::new(429, &[("Retry-After", "30")], Vec::new())));
        let (mock, service) = service(mock, &clock);

        service.flights(europe()).await;
        let single = service.flight("3c6444").await;
        assert_eq!(single.status_code(), 429);
        assert_eq!(single.body.retry_after_seconds, Some(30));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_single_fallback_within_ceiling() {
        let clock = Arc::new(ManualClock::new(T0));
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, states(1, vec![state("3c6444", 50.0, 8.0)]));
        mock.push(Ok(HttpResponse::new(500, &[], Vec::new())));
        mock.push(Ok(HttpResponse::new(500, &[], Vec::new())));
        let (_mock, service) = service(mock, &clock);

        service.flight("3c6444").await;
        clock.advance(20_000);
        let degraded = service.flight("3c6444").await;
        assert_eq!(degraded.status_code(), 200);
        assert!(degraded.body.flight.is_some());
        assert_eq!(
            degraded.body.error.as_deref(),
            Some("Upstream 500: serving cached data")
        );

        clock.advance(40_000);
        let expired = service.flight("3c6444").await;
        assert_eq!(expired.status_code(), 502);
        assert_eq!(expired.body.flight, None);
    }
}
