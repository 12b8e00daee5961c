//! Transport-level types shared by the upstream clients.

use std::collections::HashMap;

use thiserror::Error;

/// Errors raised before an HTTP status is available.
///
/// Non-2xx statuses are not errors at this layer: callers inspect
/// [`HttpResponse::status`] because a 429 carries retry headers they need.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection, TLS or protocol failure.
    #[error("request failed: {0}")]
    HttpError(String),

    /// No response within the allotted time.
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// The response body could not be read.
    #[error("failed to read response: {0}")]
    BodyError(String),
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header values keyed by lowercase header name.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response; header names are lowercased.
    pub fn new(status: u16, headers: &[(&str, &str)], body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            body: body.into(),
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(
            status,
            &[("content-type", "application/json")],
            value.to_string().into_bytes(),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the body as JSON.
    pub fn json_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let resp = HttpResponse::new(429, &[("Retry-After", "30")], Vec::new());
        assert_eq!(resp.header("retry-after"), Some("30"));
        assert_eq!(resp.header("RETRY-AFTER"), Some("30"));
        assert_eq!(resp.header("x-missing"), None);
        assert!(!resp.is_success());
    }

    #[test]
    fn test_json_body() {
        let resp = HttpResponse::json(200, &serde_json::json!({"time": 5}));
        assert!(resp.is_success());
        assert_eq!(resp.json_body().unwrap()["time"], 5);

        let bad = HttpResponse::new(200, &[], b"<html>".to_vec());
        assert!(bad.json_body().is_err());
    }
}
