//! HTTP surface.
//!
//! | Route          | Answer                                   |
//! |----------------|------------------------------------------|
//! | `/api/flights` | [`FlightsResponse`](crate::flight::FlightsResponse) for a bounding box |
//! | `/api/flight`  | [`FlightResponse`](crate::flight::FlightResponse) for one address |
//! | `/api/route`   | [`RouteResponse`](crate::route::RouteResponse) for a callsign |
//! | `/health`      | `ok`                                     |
//!
//! Every JSON answer carries `Cache-Control: no-store`; freshness is managed
//! by the service caches, not by intermediaries.

mod handlers;

pub use handlers::{BoundsQuery, FlightQuery, RouteQuery};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::provider::AsyncHttpClient;
use crate::route::RouteService;
use crate::service::FlightService;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Errors from running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Services shared by all handlers.
pub struct ServerState<C> {
    pub flights: FlightService<C>,
    pub routes: RouteService<C>,
}

/// Build the application router.
pub fn router<C: AsyncHttpClient + 'static>(state: Arc<ServerState<C>>) -> Router {
    Router::new()
        .route("/api/flights", get(handlers::flights_handler::<C>))
        .route("/api/flight", get(handlers::flight_handler::<C>))
        .route("/api/route", get(handlers::route_handler::<C>))
        .route("/health", get(handlers::health_handler))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve<C: AsyncHttpClient + 'static>(
    state: Arc<ServerState<C>>,
    bind: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind { addr: bind, source })?;
    let local = listener.local_addr().map_err(ServerError::Serve)?;
    info!(addr = %local, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ServerError::Serve)?;

    info!("HTTP server stopped");
    Ok(())
}
