//! Classification of every answer the fetch orchestrator produces.

use std::fmt;

/// Why a degraded answer was served from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    RateLimited,
    Upstream(u16),
    Malformed,
    Network,
}

impl DegradedReason {
    /// `error` label attached to a cached fallback.
    pub fn label(&self) -> String {
        match self {
            DegradedReason::RateLimited => "Rate limited: serving cached data".to_string(),
            DegradedReason::Upstream(status) => {
                format!("Upstream {}: serving cached data", status)
            }
            DegradedReason::Malformed => "Malformed upstream payload: serving cached data".to_string(),
            DegradedReason::Network => "Network issue: serving cached data".to_string(),
        }
    }
}

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh upstream data.
    Live,
    /// Served from cache within the TTL.
    CacheHit,
    /// Stale cached data, labelled.
    Fallback(DegradedReason),
    /// Backing off with nothing cached.
    RateLimited,
    /// Non-2xx or malformed upstream answer with nothing cached.
    UpstreamFailed(u16),
    /// Network failure or timeout with nothing cached.
    NetworkFailed,
    /// Upstream answered but had nothing usable (single aircraft).
    NoData,
    /// The looked-up entity does not exist (routes).
    NotFound,
    /// The request itself was invalid.
    Invalid,
}

impl FetchOutcome {
    /// HTTP status for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            FetchOutcome::Live
            | FetchOutcome::CacheHit
            | FetchOutcome::Fallback(_)
            | FetchOutcome::NoData => 200,
            FetchOutcome::RateLimited => 429,
            FetchOutcome::UpstreamFailed(_) => 502,
            FetchOutcome::NetworkFailed => 500,
            FetchOutcome::NotFound => 404,
            FetchOutcome::Invalid => 400,
        }
    }

    /// True for anything other than live or cached-within-TTL data.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, FetchOutcome::Live | FetchOutcome::CacheHit)
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Live => write!(f, "live"),
            FetchOutcome::CacheHit => write!(f, "cache-hit"),
            FetchOutcome::Fallback(reason) => write!(f, "fallback ({:?})", reason),
            FetchOutcome::RateLimited => write!(f, "rate-limited"),
            FetchOutcome::UpstreamFailed(status) => write!(f, "upstream-failed ({})", status),
            FetchOutcome::NetworkFailed => write!(f, "network-failed"),
            FetchOutcome::NoData => write!(f, "no-data"),
            FetchOutcome::NotFound => write!(f, "not-found"),
            FetchOutcome::Invalid => write!(f, "invalid"),
        }
    }
}

/// A response body together with how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub body: T,
    pub outcome: FetchOutcome,
}

impl<T> Served<T> {
    pub fn new(body: T, outcome: FetchOutcome) -> Self {
        Self { body, outcome }
    }

    pub fn status_code(&self) -> u16 {
        self.outcome.status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FetchOutcome::Live.status_code(), 200);
        assert_eq!(
            FetchOutcome::Fallback(DegradedReason::RateLimited).status_code(),
            200
        );
        assert_eq!(FetchOutcome::RateLimited.status_code(), 429);
        assert_eq!(FetchOutcome::UpstreamFailed(503).status_code(), 502);
        assert_eq!(FetchOutcome::NetworkFailed.status_code(), 500);
        assert_eq!(FetchOutcome::Invalid.status_code(), 400);
        assert_eq!(FetchOutcome::NotFound.status_code(), 404);
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            DegradedReason::Upstream(503).label(),
            "Upstream 503: serving cached data"
        );
        assert_eq!(
            DegradedReason::Network.label(),
            "Network issue: serving cached data"
        );
        assert!(FetchOutcome::Fallback(DegradedReason::Malformed).is_degraded());
        assert!(!FetchOutcome::CacheHit.is_degraded());
    }
}
