//! Rate Limiter (spec §4.8): a distributed token bucket keyed by client IP,
//! backed by the same Redis store as the response cache.
//!
//! Implemented as a fixed-window counter rather than a true token bucket —
//! simpler to reason about under the spec's stated defaults (100 req /
//! 60s window) and cheap as a single `INCR` + conditional `EXPIRE` per
//! request, which is what the `throttle:` prefix is shaped for.

use std::time::Duration;

use redis::AsyncCommands;

/// Distributed rate limiter. Failures against the backing store fail
/// open — a client is never blocked because Redis is unavailable.
#[derive(Clone)]
pub struct RateLimiter {
    manager: redis::aio::ConnectionManager,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(manager: redis::aio::ConnectionManager, limit: u32, window: Duration) -> Self {
        Self {
            manager,
            limit,
            window,
        }
    }

    /// Increment the request counter for `client_ip` and report whether
    /// this request should be allowed.
    pub async fn check(&self, client_ip: &str) -> RateLimitDecision {
        let key = format!("throttle:{client_ip}");
        let mut conn = self.manager.clone();

        let count: i64 = match conn.incr(&key, 1).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, client_ip, "rate limiter store unavailable, failing open");
                return RateLimitDecision::Allowed;
            }
        };

        if count == 1 {
            let window_secs = self.window.as_secs().max(1);
            if let Err(err) = conn.expire::<_, ()>(&key, i64::try_from(window_secs).unwrap_or(60)).await {
                tracing::warn!(error = %err, client_ip, "failed to set throttle window expiry");
            }
        }

        if count > i64::from(self.limit) {
            RateLimitDecision::Exceeded
        } else {
            RateLimitDecision::Allowed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Exceeded,
}
