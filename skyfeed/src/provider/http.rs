//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use super::types::{HttpResponse, ProviderError};

/// Default connect/read timeout for the shared client.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for async HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. Implementations return the
/// response for every status code; only transport failures are errors.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request, optionally with a bearer token.
    fn get(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;

    /// Performs a form-encoded HTTP POST request.
    fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;
}

/// Async HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new client with the default timeout.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new client with a custom overall timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skyfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::HttpError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    async fn collect(url: &str, response: reqwest::Response) -> Result<HttpResponse, ProviderError> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::BodyError(format!("{} ({})", e, url)))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn send_error(url: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            url: url.to_string(),
            timeout_ms: 0,
        }
    } else {
        ProviderError::HttpError(format!("{} ({})", e, url))
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, ProviderError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| send_error(url, e))?;
        Self::collect(url, response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, ProviderError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        Self::collect(url, response).await
    }
}

/// Run a request future with a deadline, mapping expiry to [`ProviderError::Timeout`].
pub async fn with_deadline<F>(url: &str, timeout: Duration, request: F) -> Result<HttpResponse, ProviderError>
where
    F: Future<Output = Result<HttpResponse, ProviderError>>,
{
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// A request seen by [`MockAsyncHttpClient`].
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub method: &'static str,
        pub url: String,
        pub bearer: Option<String>,
        pub form: Vec<(String, String)>,
    }

    /// Mock HTTP client replaying scripted responses in order.
    ///
    /// When the script runs dry every further request fails with a transport error.
    #[derive(Default)]
    pub struct MockAsyncHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, ProviderError>>>,
        requests: Mutex<Vec<RecordedRequest>>,
        delay: Duration,
    }

    impl MockAsyncHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every response (use with paused tokio time).
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn push(&self, response: Result<HttpResponse, ProviderError>) {
            self.responses.lock().push_back(response);
        }

        pub fn push_json(&self, status: u16, value: serde_json::Value) {
            self.push(Ok(HttpResponse::json(status, &value)));
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        async fn respond(&self, request: RecordedRequest) -> Result<HttpResponse, ProviderError> {
            self.requests.lock().push(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.responses.lock().pop_front();
            next.unwrap_or_else(|| Err(ProviderError::HttpError("no scripted response".into())))
        }
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, ProviderError> {
            self.respond(RecordedRequest {
                method: "GET",
                url: url.to_string(),
                bearer: bearer.map(str::to_string),
                form: Vec::new(),
            })
            .await
        }

        async fn post_form(
            &self,
            url: &str,
            form: &[(&str, &str)],
        ) -> Result<HttpResponse, ProviderError> {
            self.respond(RecordedRequest {
                method: "POST",
                url: url.to_string(),
                bearer: None,
                form: form
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
            .await
        }
    }

    #[tokio::test]
    async fn test_mock_client_replays_in_order() {
        let mock = MockAsyncHttpClient::new();
        mock.push_json(200, serde_json::json!({"n": 1}));
        mock.push(Ok(HttpResponse::new(503, &[], Vec::new())));

        let first = mock.get("http://example.com/a", Some("tok")).await.unwrap();
        assert_eq!(first.status, 200);
        let second = mock.get("http://example.com/b", None).await.unwrap();
        assert_eq!(second.status, 503);
        assert!(mock.get("http://example.com/c", None).await.is_err());

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].bearer.as_deref(), Some("tok"));
        assert_eq!(requests[1].url, "http://example.com/b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_times_out() {
        let mock = MockAsyncHttpClient::new().with_delay(Duration::from_secs(10));
        mock.push_json(200, serde_json::json!({}));

        let result = with_deadline(
            "http://example.com",
            Duration::from_secs(1),
            mock.get("http://example.com", None),
        )
        .await;

        assert_eq!(
            result,
            Err(ProviderError::Timeout {
                url: "http://example.com".to_string(),
                timeout_ms: 1000
            })
        );
    }
}
