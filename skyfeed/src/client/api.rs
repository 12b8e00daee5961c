//! Transport between the polling client and the flight service.
//!
//! The client loops only speak [`FlightApi`]. [`HttpFlightApi`] talks to a
//! running `skyfeed serve` instance; [`LocalFlightApi`] calls the services
//! in-process, which is what `skyfeed snapshot` and the tests use.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::flight::{FlightResponse, FlightsResponse};
use crate::geo::BoundingBox;
use crate::provider::AsyncHttpClient;
use crate::route::RouteResponse;
use crate::server::ServerState;

/// Default server URL the client polls.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Per-request timeout of the HTTP client.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from talking to the flight service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Request(e.to_string())
        }
    }
}

/// Flight data source used by the client loops.
///
/// Implementations return the response body whatever the HTTP status was;
/// degraded answers are recognised by their `error`/`rateLimited` fields.
pub trait FlightApi: Send + Sync {
    /// Snapshot of all aircraft inside `bounds`.
    fn flights(
        &self,
        bounds: BoundingBox,
    ) -> impl Future<Output = Result<FlightsResponse, ClientError>> + Send;

    /// Latest state of one aircraft.
    fn flight(
        &self,
        icao24: &str,
    ) -> impl Future<Output = Result<FlightResponse, ClientError>> + Send;

    /// Route flown under `callsign`.
    fn route(
        &self,
        callsign: &str,
    ) -> impl Future<Output = Result<RouteResponse, ClientError>> + Send;
}

// ============================================================================
// HTTP transport
// ============================================================================

/// [`FlightApi`] over HTTP against a running server.
#[derive(Debug, Clone)]
pub struct HttpFlightApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFlightApi {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_CLIENT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.client.get(url).send().await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl FlightApi for HttpFlightApi {
    async fn flights(&self, bounds: BoundingBox) -> Result<FlightsResponse, ClientError> {
        let url = self.endpoint("/api/flights", &bounds.to_query())?;
        self.get_json(url).await
    }

    async fn flight(&self, icao24: &str) -> Result<FlightResponse, ClientError> {
        let url = self.endpoint("/api/flight", &[("icao24", icao24.to_string())])?;
        self.get_json(url).await
    }

    async fn route(&self, callsign: &str) -> Result<RouteResponse, ClientError> {
        let url = self.endpoint("/api/route", &[("callsign", callsign.to_string())])?;
        self.get_json(url).await
    }
}

// ============================================================================
// In-process transport
// ============================================================================

/// [`FlightApi`] calling the services directly, without a server hop.
pub struct LocalFlightApi<C> {
    state: Arc<ServerState<C>>,
}

impl<C> LocalFlightApi<C> {
    pub fn new(state: Arc<ServerState<C>>) -> Self {
        Self { state }
    }
}

impl<C> Clone for LocalFlightApi<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: AsyncHttpClient + 'static> FlightApi for LocalFlightApi<C> {
    async fn flights(&self, bounds: BoundingBox) -> Result<FlightsResponse, ClientError> {
        Ok(self.state.flights.flights(bounds).await.body)
    }

    async fn flight(&self, icao24: &str) -> Result<FlightResponse, ClientError> {
        Ok(self.state.flights.flight(icao24).await.body)
    }

    async fn route(&self, callsign: &str) -> Result<RouteResponse, ClientError> {
        Ok(self.state.routes.route(callsign).await.body)
    }
}
