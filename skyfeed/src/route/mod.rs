//! Callsign to route lookup.
//!
//! Routes come from adsbdb, a separate free API, and are only used to draw the
//! selected aircraft's path to its destination. Answers, including "not
//! found", are cached for ten minutes so a selected aircraft costs one lookup.

mod adsbdb;
mod cache;

pub use adsbdb::{parse_airport, parse_route, ParsedRoute, DEFAULT_ADSBDB_URL};
pub use cache::{RouteCache, DEFAULT_ROUTE_TTL, MAX_ROUTE_ENTRIES};

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::provider::{with_deadline, AsyncHttpClient};
use crate::service::{FetchOutcome, Served};

/// Timeout for one adsbdb request.
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(8);

/// An airport on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub icao: String,
    pub iata: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Body of `GET /api/route`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub callsign: String,
    pub departure: Option<Airport>,
    pub destination: Option<Airport>,
    pub operator_iata: Option<String>,
    pub flight_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteResponse {
    pub fn not_found(callsign: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            callsign: callsign.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn from_parsed(callsign: &str, parsed: ParsedRoute) -> Self {
        Self {
            callsign: callsign.to_string(),
            departure: parsed.departure,
            destination: parsed.destination,
            operator_iata: parsed.operator_iata,
            flight_number: parsed.flight_number,
            error: None,
        }
    }

    /// A route is known once its departure airport is.
    pub fn is_known(&self) -> bool {
        self.departure.is_some()
    }
}

fn callsign_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{2,8}$").expect("static callsign pattern"))
}

/// Trim and uppercase a callsign; `None` if it cannot be a callsign.
pub fn normalize_callsign(raw: &str) -> Option<String> {
    let callsign = raw.trim().to_ascii_uppercase();
    callsign_pattern()
        .is_match(&callsign)
        .then_some(callsign)
}

/// Cached adsbdb client.
pub struct RouteService<C> {
    client: Arc<C>,
    cache: RouteCache,
    clock: Arc<dyn Clock>,
    base_url: String,
    timeout: Duration,
}

impl<C: AsyncHttpClient> RouteService<C> {
    pub fn new(client: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            cache: RouteCache::default(),
            clock,
            base_url: DEFAULT_ADSBDB_URL.to_string(),
            timeout: DEFAULT_ROUTE_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    /// Route for `raw_callsign`.
    pub async fn route(&self, raw_callsign: &str) -> Served<RouteResponse> {
        if raw_callsign.trim().is_empty() {
            return Served::new(
                RouteResponse::not_found("", "Missing callsign"),
                FetchOutcome::Invalid,
            );
        }
        let Some(callsign) = normalize_callsign(raw_callsign) else {
            return Served::new(
                RouteResponse::not_found(raw_callsign.trim(), "Invalid callsign"),
                FetchOutcome::Invalid,
            );
        };

        let now = self.clock.now_millis();
        if let Some(cached) = self.cache.get(&callsign, now) {
            debug!(callsign = %callsign, known = cached.is_known(), "route cache hit");
            let outcome = if cached.is_known() {
                FetchOutcome::CacheHit
            } else {
                FetchOutcome::NotFound
            };
            return Served::new(cached, outcome);
        }

        let url = format!("{}/{}", self.base_url, callsign);
        let response = match with_deadline(&url, self.timeout, self.client.get(&url, None)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(callsign = %callsign, error = %e, "route lookup failed");
                return Served::new(
                    RouteResponse::not_found(&callsign, e.to_string()),
                    FetchOutcome::NetworkFailed,
                );
            }
        };

        if response.status == 404 || response.status == 400 {
            return self.remember_missing(&callsign, "Route not found", now);
        }

        if !response.is_success() {
            warn!(callsign = %callsign, status = response.status, "route lookup returned error status");
            return Served::new(
                RouteResponse::not_found(&callsign, format!("API error: {}", response.status)),
                FetchOutcome::UpstreamFailed(response.status),
            );
        }

        let parsed = response.json_body().ok().and_then(|raw| parse_route(&raw));
        let Some(parsed) = parsed else {
            return self.remember_missing(&callsign, "No route data", now);
        };

        let route = RouteResponse::from_parsed(&callsign, parsed);
        self.cache.put(&callsign, route.clone(), now);
        let outcome = if route.is_known() {
            FetchOutcome::Live
        } else {
            FetchOutcome::NotFound
        };
        Served::new(route, outcome)
    }

    fn remember_missing(&self, callsign: &str, error: &str, now: i64) -> Served<RouteResponse> {
        debug!(callsign = %callsign, error, "no route");
        let response = RouteResponse::not_found(callsign, error);
        self.cache.put(callsign, response.clone(), now);
        Served::new(response, FetchOutcome::NotFound)
    }
}
