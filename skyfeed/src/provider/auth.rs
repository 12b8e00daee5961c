//! OAuth2 client-credentials token cache.
//!
//! OpenSky accepts anonymous requests, so a missing or failed token never
//! blocks a fetch: callers simply go without the `Authorization` header.
//!
//! # Single flight
//!
//! ```text
//! caller A ──┐
//! caller B ──┼──► in_flight: Shared<exchange> ──► POST token endpoint
//! caller C ──┘          │
//!                       └──► stores Credential, clears in_flight
//! ```
//!
//! The state lock is only held to inspect or swap the slot, never across an
//! `.await`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::http::{with_deadline, AsyncHttpClient};
use super::types::ProviderError;
use crate::clock::Clock;

/// OpenSky token endpoint.
pub const DEFAULT_TOKEN_URL: &str =
    "https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token";

/// Tokens are refreshed this long before they expire.
pub const TOKEN_REFRESH_BUFFER_MS: i64 = 60_000;

/// Lifetime assumed when the endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: f64 = 1800.0;

/// Timeout for one token exchange.
pub const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable holding the client id.
pub const CLIENT_ID_ENV: &str = "OPENSKY_CLIENT_ID";

/// Environment variable holding the client secret.
pub const CLIENT_SECRET_ENV: &str = "OPENSKY_CLIENT_SECRET";

/// OAuth2 client id and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Read credentials from the environment; both variables must be non-empty.
    pub fn from_env() -> Option<Self> {
        let id = std::env::var(CLIENT_ID_ENV).ok()?;
        let secret = std::env::var(CLIENT_SECRET_ENV).ok()?;
        Self::from_parts(&id, &secret)
    }

    fn from_parts(id: &str, secret: &str) -> Option<Self> {
        let (id, secret) = (id.trim(), secret.trim());
        if id.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self::new(id, secret))
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A bearer token and its absolute expiry (epoch ms).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: i64,
}

impl Credential {
    /// Usable until [`TOKEN_REFRESH_BUFFER_MS`] before expiry.
    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at.saturating_sub(TOKEN_REFRESH_BUFFER_MS)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Why a token exchange produced nothing.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Transport(#[from] ProviderError),

    #[error("token endpoint returned status {0}")]
    Status(u16),

    #[error("malformed token response: {0}")]
    Malformed(String),
}

type PendingExchange = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Default)]
struct TokenState {
    credential: Option<Credential>,
    in_flight: Option<PendingExchange>,
    exchanges: u64,
}

/// Lazily refreshed bearer token for one upstream service.
pub struct CredentialCache<C> {
    client: Arc<C>,
    credentials: Option<ClientCredentials>,
    token_url: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<TokenState>>,
}

impl<C: AsyncHttpClient + 'static> CredentialCache<C> {
    /// Create a cache; `None` credentials means anonymous access.
    pub fn new(client: Arc<C>, credentials: Option<ClientCredentials>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            credentials,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            timeout: TOKEN_REQUEST_TIMEOUT,
            clock,
            state: Arc::new(Mutex::new(TokenState::default())),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// True if client credentials are configured.
    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Number of completed token exchanges, successful or not.
    pub fn exchange_count(&self) -> u64 {
        self.state.lock().exchanges
    }

    /// Current bearer token, refreshing it if needed.
    ///
    /// Returns `None` for anonymous access and when the exchange fails.
    pub async fn token(&self) -> Option<String> {
        let credentials = self.credentials.as_ref()?;

        let pending = {
            let mut state = self.state.lock();
            if let Some(credential) = &state.credential {
                if credential.is_fresh_at(self.clock.now_millis()) {
                    return Some(credential.token.clone());
                }
            }
            match &state.in_flight {
                Some(pending) => {
                    debug!("joining in-flight token exchange");
                    pending.clone()
                }
                None => {
                    let pending = self.start_exchange(credentials.clone());
                    state.in_flight = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start_exchange(&self, credentials: ClientCredentials) -> PendingExchange {
        let client = Arc::clone(&self.client);
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let url = self.token_url.clone();
        let timeout = self.timeout;

        async move {
            let result =
                request_access_token(client.as_ref(), &url, &credentials, timeout, clock.as_ref())
                    .await;

            let mut state = state.lock();
            state.in_flight = None;
            state.exchanges += 1;
            match result {
                Ok(credential) => {
                    debug!(expires_at = credential.expires_at, "obtained OpenSky access token");
                    let token = credential.token.clone();
                    state.credential = Some(credential);
                    Some(token)
                }
                Err(e) => {
                    warn!(error = %e, "OpenSky token exchange failed, continuing anonymously");
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn request_access_token<C: AsyncHttpClient>(
    client: &C,
    url: &str,
    credentials: &ClientCredentials,
    timeout: Duration,
    clock: &dyn Clock,
) -> Result<Credential, TokenError> {
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
    ];

    let response = with_deadline(url, timeout, client.post_form(url, &form)).await?;
    if !response.is_success() {
        return Err(TokenError::Status(response.status));
    }

    let body = response
        .json_body()
        .map_err(|e| TokenError::Malformed(e.to_string()))?;

    let token = body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TokenError::Malformed("missing access_token".to_string()))?;

    let expires_in = body
        .get("expires_in")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    let lifetime_secs = (expires_in.floor() as i64).max(1);

    Ok(Credential {
        token: token.to_string(),
        expires_at: clock
            .now_millis()
            .saturating_add(lifetime_secs.saturating_mul(1000)),
    })
}
