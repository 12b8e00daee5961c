//! Upstream access: HTTP transport, OAuth2 credentials and the OpenSky
//! state vector format.

pub mod auth;
mod http;
pub mod opensky;
mod retry_after;
mod types;

pub use auth::{ClientCredentials, Credential, CredentialCache};
pub use http::{with_deadline, AsyncHttpClient, ReqwestClient};
pub use opensky::{parse_snapshot, parse_snapshot_bytes, to_flight, StatesSnapshot};
pub use retry_after::{rate_limit_delay_ms, DEFAULT_RATE_LIMIT_BACKOFF_MS};
pub use types::{HttpResponse, ProviderError};

#[cfg(test)]
pub use http::tests::{MockAsyncHttpClient, RecordedRequest};
