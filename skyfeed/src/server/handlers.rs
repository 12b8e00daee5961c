//! Request handlers for the HTTP surface.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ServerState;
use crate::flight::FlightsResponse;
use crate::geo::BoundingBox;
use crate::provider::AsyncHttpClient;
use crate::service::Served;

// ============================================================================
// Query parameters
// ============================================================================

/// Raw `/api/flights` parameters; parsed by hand so bad numbers yield 400.
#[derive(Debug, Default, Deserialize)]
pub struct BoundsQuery {
    pub lamin: Option<String>,
    pub lomin: Option<String>,
    pub lamax: Option<String>,
    pub lomax: Option<String>,
}

impl BoundsQuery {
    /// Normalized bounds, using the default viewport for absent edges.
    ///
    /// `None` if any present value is not a finite number.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let defaults = BoundingBox::default();
        let lamin = edge(self.lamin.as_deref(), defaults.south)?;
        let lomin = edge(self.lomin.as_deref(), defaults.west)?;
        let lamax = edge(self.lamax.as_deref(), defaults.north)?;
        let lomax = edge(self.lomax.as_deref(), defaults.east)?;
        Some(BoundingBox::normalized(lamin, lomin, lamax, lomax))
    }
}

fn edge(raw: Option<&str>, default: f64) -> Option<f64> {
    match raw.map(str::trim) {
        None | Some("") => Some(default),
        Some(value) => value.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FlightQuery {
    pub icao24: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    pub callsign: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /api/flights`
pub async fn flights_handler<C: AsyncHttpClient + 'static>(
    State(state): State<Arc<ServerState<C>>>,
    Query(query): Query<BoundsQuery>,
) -> Response {
    let Some(bounds) = query.bounds() else {
        let now = state.flights.now_millis();
        return no_store(
            StatusCode::BAD_REQUEST,
            FlightsResponse::empty(now, "Invalid bounds"),
        );
    };

    let served = state.flights.flights(bounds).await;
    debug!(bounds = %bounds, outcome = %served.outcome, count = served.body.count, "GET /api/flights");
    served_response(served)
}

/// `GET /api/flight`
pub async fn flight_handler<C: AsyncHttpClient + 'static>(
    State(state): State<Arc<ServerState<C>>>,
    Query(query): Query<FlightQuery>,
) -> Response {
    let served = state
        .flights
        .flight(query.icao24.as_deref().unwrap_or_default())
        .await;
    debug!(icao24 = ?query.icao24, outcome = %served.outcome, "GET /api/flight");
    served_response(served)
}

/// `GET /api/route`
pub async fn route_handler<C: AsyncHttpClient + 'static>(
    State(state): State<Arc<ServerState<C>>>,
    Query(query): Query<RouteQuery>,
) -> Response {
    let served = state
        .routes
        .route(query.callsign.as_deref().unwrap_or_default())
        .await;
    debug!(callsign = ?query.callsign, outcome = %served.outcome, "GET /api/route");
    served_response(served)
}

/// `GET /health`
pub async fn health_handler() -> &'static str {
    "ok"
}

// ============================================================================
// Responses
// ============================================================================

fn served_response<T: Serialize>(served: Served<T>) -> Response {
    let status =
        StatusCode::from_u16(served.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    no_store(status, served.body)
}

/// JSON body that intermediaries must not cache.
fn no_store<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, [(header::CACHE_CONTROL, "no-store")], Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::provider::{CredentialCache, HttpResponse, MockAsyncHttpClient};
    use crate::route::RouteService;
    use crate::service::{FlightService, FlightServiceConfig};
    use serde_json::{json, Value};

    const T0: i64 = 1_700_000_000_000;

    fn state_with(mock: MockAsyncHttpClient) -> Arc<ServerState<MockAsyncHttpClient>> {
        let mock = Arc::new(mock);
        let clock = Arc::new(ManualClock::new(T0));
        let credentials = CredentialCache::new(Arc::clone(&mock), None, clock.clone());
        Arc::new(ServerState {
            flights: FlightService::new(
                Arc::clone(&mock),
                credentials,
                clock.clone(),
                FlightServiceConfig::default(),
            ),
            routes: RouteService::new(mock, clock),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn query(lamin: &str, lomin: &str, lamax: &str, lomax: &str) -> BoundsQuery {
        BoundsQuery {
            lamin: Some(lamin.to_string()),
            lomin: Some(lomin.to_string()),
            lamax: Some(lamax.to_string()),
            lomax: Some(lomax.to_string()),
        }
    }

    #[test]
    fn test_bounds_query_defaults_and_validation() {
        assert_eq!(BoundsQuery::default().bounds(), Some(BoundingBox::default()));
        assert_eq!(
            query("50", "10", "40", "-10").bounds(),
            Some(BoundingBox::normalized(40.0, -10.0, 50.0, 10.0))
        );
        assert!(query("abc", "0", "1", "1").bounds().is_none());
        assert!(query("NaN", "0", "1", "1").bounds().is_none());
        assert!(query("inf", "0", "1", "1").bounds().is_none());
        assert!(query("0", "0", "1", "-infinity").bounds().is_none());

        let partial = BoundsQuery {
            lamin: Some("".to_string()),
            ..Default::default()
        };
        assert_eq!(partial.bounds(), Some(BoundingBox::default()));
    }

    #[tokio::test]
    async fn test_invalid_bounds_is_400() {
        let state = state_with(MockAsyncHttpClient::new());
        let response =
            flights_handler(State(state), Query(query("x", "0", "1", "1"))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid bounds");
        assert_eq!(body["count"], 0);
        assert_eq!(body["flights"], json!([]));
    }

    #[tokio::test]
    async fn test_infinite_bound_is_400_without_upstream_call() {
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, json!({ "time": 1_700_000_000, "states": [] }));
        let state = state_with(mock);

        let partial = BoundsQuery {
            lamin: Some("inf".to_string()),
            ..Default::default()
        };
        let response = flights_handler(State(Arc::clone(&state)), Query(partial)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid bounds");
        assert_eq!(state.flights.region_cache().len(), 0);
    }

    #[tokio::test]
    async fn test_flights_ok() {
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, json!({ "time": 1_700_000_000, "states": [] }));
        let state = state_with(mock);

        let ok = flights_handler(State(state), Query(BoundsQuery::default())).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()[header::CACHE_CONTROL], "no-store");
        let body = body_json(ok).await;
        assert_eq!(body["timestamp"], 1_700_000_000_000_i64);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_flights_rate_limited_without_cache_is_429() {
        let mock = MockAsyncHttpClient::new();
        mock.push(Ok(HttpResponse::new(429, &[], Vec::new())));
        let state = state_with(mock);

        let limited = flights_handler(State(state), Query(BoundsQuery::default())).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(limited).await;
        assert_eq!(body["rateLimited"], true);
        assert_eq!(body["retryAfterSeconds"], 15);
        assert_eq!(body["error"], "Rate limited");
    }

    #[tokio::test]
    async fn test_flight_missing_param_is_400() {
        let state = state_with(MockAsyncHttpClient::new());
        let response = flight_handler(State(state), Query(FlightQuery::default())).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["flight"], Value::Null);
        assert_eq!(body["error"], "Missing icao24 parameter");
    }

    #[tokio::test]
    async fn test_route_not_found_is_404() {
        let mock = MockAsyncHttpClient::new();
        mock.push(Ok(HttpResponse::new(404, &[], Vec::new())));
        let state = state_with(mock);

        let response = route_handler(
            State(state),
            Query(RouteQuery {
                callsign: Some("DLH400".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["callsign"], "DLH400");
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health_handler().await, "ok");
    }
}
