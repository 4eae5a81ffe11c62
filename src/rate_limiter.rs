//! # Sliding-Window Rate Limiter
//!
//! Admission control keyed by operation + tenant (`getTemplates:org-1`).
//! Each key tracks the request instants inside the trailing window; a
//! request is admitted and recorded while the in-window count is below the
//! limit. Strict mode turns denial into a `RATE_LIMIT_EXCEEDED` error,
//! non-strict mode logs a warning and reports `false`.
//!
//! State is process-local. Horizontal scaling needs a shared limiter behind
//! the same surface.

use dashmap::DashMap;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{RateError, RateErrorCode, RateResult};

#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    limit: usize,
    window: Duration,
    strict: bool,
    windows: DashMap<String, Vec<Instant>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(limit: usize, window: Duration, strict: bool) -> Self {
        Self {
            limit,
            window,
            strict,
            windows: DashMap::new(),
        }
    }

    /// Admit or deny one request under `key`.
    ///
    /// Admitted requests are recorded into the key's window. The per-key
    /// entry guard makes prune-check-record atomic with respect to other
    /// callers of the same key.
    pub fn check(&self, key: &str) -> RateResult<bool> {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_default();
        entry.retain(|requested| now.duration_since(*requested) < self.window);

        if entry.len() < self.limit {
            entry.push(now);
            return Ok(true);
        }

        if self.strict {
            Err(RateError::new(
                format!("rate limit exceeded for {key}"),
                RateErrorCode::RateLimitExceeded,
            )
            .with_context("key", json!(key))
            .with_context("limit", json!(self.limit))
            .with_context("window_ms", json!(self.window.as_millis() as u64)))
        } else {
            warn!(
                key = key,
                limit = self.limit,
                window_ms = self.window.as_millis() as u64,
                "rate limit exceeded"
            );
            Ok(false)
        }
    }

    pub fn reset(&self, key: &str) {
        self.windows.remove(key);
    }

    pub fn reset_all(&self) {
        self.windows.clear();
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
