//! crates/trashtalk_core/src/rate_limit.rs
//!
//! A soft, rolling-window rate limiter over the shared request log.
//!
//! The check-then-record sequence is deliberately not transactional: two
//! concurrent requests from the same identity can both read `cap - 1` and
//! both pass, overrunning the cap by a small amount. The limit guards a paid
//! upstream, not a security boundary, so that race is accepted.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::ports::{PortError, RequestLog};

/// Outcomes of a rate-limit check that stop the request.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded: {current} of {cap} requests used in the last {window_hours}h")]
    Exceeded {
        current: i64,
        cap: i64,
        window_hours: i64,
    },

    /// The counting query itself failed. The limiter fails closed: an
    /// unanswerable "how many so far?" rejects the request rather than
    /// waving through unlimited traffic.
    #[error("Failed to check usage limits: {0}")]
    CheckFailed(#[from] PortError),
}

/// Bounds how many generation requests an identity may issue per rolling
/// window, counting against the persisted request log.
pub struct RateLimiter {
    log: Arc<dyn RequestLog>,
    cap: i64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(log: Arc<dyn RequestLog>, cap: i64, window: Duration) -> Self {
        Self { log, cap, window }
    }

    /// Checks the trailing window for `identity` and, if under the cap,
    /// records this request. Returns the count of prior requests in the
    /// window on success.
    pub async fn check_and_consume(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, RateLimitError> {
        let since = now - self.window;
        let current = self.log.count_since(identity, since).await?;

        if current >= self.cap {
            return Err(RateLimitError::Exceeded {
                current,
                cap: self.cap,
                window_hours: self.window.num_hours(),
            });
        }

        self.log.record(identity, now).await?;
        Ok(current)
    }
}
