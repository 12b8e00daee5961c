//! Shared upstream backoff window.

use std::sync::atomic::{AtomicI64, Ordering};

/// Epoch-ms instant before which no upstream request is made.
///
/// One value per service, shared by the bulk and single-aircraft paths since
/// the upstream quota is account-wide. Extensions only ever move the instant
/// forward, so concurrent 429s cannot shorten each other's backoff.
#[derive(Debug, Default)]
pub struct RateLimitState {
    until: AtomicI64,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current backoff instant (0 when clear).
    pub fn until(&self) -> i64 {
        self.until.load(Ordering::Acquire)
    }

    pub fn is_limited_at(&self, now_ms: i64) -> bool {
        now_ms < self.until()
    }

    /// Back off for `delay_ms` from `now_ms`, keeping any later deadline.
    ///
    /// Returns the effective deadline.
    pub fn extend(&self, now_ms: i64, delay_ms: i64) -> i64 {
        let candidate = now_ms.saturating_add(delay_ms);
        let previous = self.until.fetch_max(candidate, Ordering::AcqRel);
        previous.max(candidate)
    }

    /// Whole seconds until the window closes, at least 1.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let remaining = self.until().saturating_sub(now_ms).max(0);
        (remaining.saturating_add(999) / 1000).max(1) as u64
    }

    /// Forget the backoff after a successful upstream answer.
    pub fn clear(&self) {
        self.until.store(0, Ordering::Release);
    }
}
