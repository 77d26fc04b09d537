//! Request-scoped deadline, threaded through every external call.
//!
//! Every dependency call (cache, engine, catalog) races against both its
//! own per-dependency timeout and the request's global deadline, whichever
//! is shorter. This is the single mechanism the rest of the crate uses for
//! cancellation (spec §5, §9): nothing holds a connection across a
//! suspension once the global deadline has passed.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::error::Elapsed;

/// A point in time beyond which the current request must stop waiting on
/// external dependencies.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// Start a deadline `timeout` from now.
    #[must_use]
    pub fn starting_now(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
        }
    }

    /// Time remaining until the deadline, or `Duration::ZERO` if already
    /// past.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Run `fut` under whichever is shorter: the dependency's own timeout,
    /// or the time remaining on this deadline.
    pub async fn race<F, T>(&self, dependency_timeout: Duration, fut: F) -> Result<T, Elapsed>
    where
        F: Future<Output = T>,
    {
        let budget = dependency_timeout.min(self.remaining());
        tokio::time::timeout(budget, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_deadline_has_nearly_full_remaining_time() {
        let deadline = Deadline::starting_now(Duration::from_secs(30));
        assert!(deadline.remaining() > Duration::from_secs(29));
        assert!(!deadline.has_expired());
    }

    #[test]
    fn zero_timeout_is_already_expired() {
        let deadline = Deadline::starting_now(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(1));
        assert!(deadline.has_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn race_picks_the_shorter_of_the_two_budgets() {
        let deadline = Deadline::starting_now(Duration::from_millis(10));
        let result = deadline
            .race(Duration::from_secs(30), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too slow"
            })
            .await;
        assert!(result.is_err());
    }
}
