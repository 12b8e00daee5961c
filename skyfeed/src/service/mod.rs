//! Server-side freshness pipeline.
//!
//! [`FlightService`] sits between HTTP handlers and the upstream feed. It owns
//! the region and single-aircraft caches, the shared rate-limit window and the
//! credential cache, and turns every upstream condition into a labelled
//! [`Served`] answer.

mod flights;
mod outcome;
mod rate_limit;

pub use flights::{
    normalize_icao24, FlightService, FlightServiceConfig, IcaoError, ServiceStats, DEFAULT_BULK_TIMEOUT,
    DEFAULT_SINGLE_TIMEOUT, MALFORMED_PAYLOAD,
};
pub use outcome::{DegradedReason, FetchOutcome, Served};
pub use rate_limit::RateLimitState;
