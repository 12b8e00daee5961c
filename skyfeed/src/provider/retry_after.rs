//! Backoff hints from 429 responses.

use chrono::{DateTime, Utc};

use super::types::HttpResponse;

/// OpenSky's own backoff header, in whole seconds.
pub const OPENSKY_RETRY_HEADER: &str = "x-rate-limit-retry-after-seconds";

/// Backoff applied when a 429 carries no usable hint.
pub const DEFAULT_RATE_LIMIT_BACKOFF_MS: i64 = 15_000;

/// Longest backoff honoured, however far out the hint points.
pub const MAX_RATE_LIMIT_BACKOFF_MS: i64 = 24 * 60 * 60 * 1000;

/// Milliseconds to back off after a 429 received at `now_ms`.
///
/// Tries the OpenSky header, then `Retry-After` (integer seconds or an
/// HTTP-date), then [`DEFAULT_RATE_LIMIT_BACKOFF_MS`]. Hints are capped at
/// [`MAX_RATE_LIMIT_BACKOFF_MS`].
pub fn rate_limit_delay_ms(response: &HttpResponse, now_ms: i64) -> i64 {
    let hinted = response
        .header(OPENSKY_RETRY_HEADER)
        .and_then(positive_seconds)
        .map(seconds_to_ms)
        .or_else(|| {
            response
                .header("retry-after")
                .and_then(|value| retry_after_ms(value, now_ms))
        });

    match hinted {
        Some(ms) if ms > 0 => ms.min(MAX_RATE_LIMIT_BACKOFF_MS),
        _ => DEFAULT_RATE_LIMIT_BACKOFF_MS,
    }
}

/// Parse a `Retry-After` value into a delay from `now_ms`.
fn retry_after_ms(value: &str, now_ms: i64) -> Option<i64> {
    if let Some(secs) = positive_seconds(value) {
        return Some(seconds_to_ms(secs));
    }

    let retry_at: DateTime<Utc> = DateTime::parse_from_rfc2822(value.trim())
        .ok()?
        .with_timezone(&Utc);
    Some(retry_at.timestamp_millis().saturating_sub(now_ms).max(0))
}

fn seconds_to_ms(secs: i64) -> i64 {
    secs.saturating_mul(1000).min(MAX_RATE_LIMIT_BACKOFF_MS)
}

/// Leading integer of a header value, if positive ("20", "20s", "1.5").
///
/// Digit runs too long for an `i64` saturate rather than being dropped.
fn positive_seconds(value: &str) -> Option<i64> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    let secs = digits.parse::<i64>().unwrap_or(i64::MAX);
    (secs > 0).then_some(secs)
}
