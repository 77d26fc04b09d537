//! Inline circuit breaker (spec §5, §9).
//!
//! Deliberately not backed by an external crate: the state machine is a
//! rolling window of error counts behind a mutex plus an atomic state tag,
//! small enough to implement directly (per the design note in spec §9).
//! One instance guards each external dependency: `engine-search` and
//! `catalog-variants`.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crate::config::CircuitConfig;

const BUCKET_COUNT: usize = 10;
const BUCKET_WIDTH: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    successes: u32,
    failures: u32,
    started_at: Option<Instant>,
}

struct Window {
    buckets: [Bucket; BUCKET_COUNT],
    cursor: usize,
}

impl Window {
    fn new() -> Self {
        Self {
            buckets: [Bucket::default(); BUCKET_COUNT],
            cursor: 0,
        }
    }

    /// Advance the cursor, clearing any buckets whose window has aged out,
    /// and return the index of the current bucket.
    fn advance(&mut self, now: Instant) -> usize {
        let current = &mut self.buckets[self.cursor];
        match current.started_at {
            Some(started) if now.duration_since(started) < BUCKET_WIDTH => {}
            _ => {
                let elapsed_buckets = current
                    .started_at
                    .map_or(BUCKET_COUNT, |started| {
                        (now.duration_since(started).as_secs_f64() / BUCKET_WIDTH.as_secs_f64())
                            .floor() as usize
                    })
                    .min(BUCKET_COUNT);
                for step in 1..=elapsed_buckets.max(1) {
                    let idx = (self.cursor + step) % BUCKET_COUNT;
                    self.buckets[idx] = Bucket {
                        successes: 0,
                        failures: 0,
                        started_at: Some(now),
                    };
                }
                self.cursor = (self.cursor + elapsed_buckets.max(1)) % BUCKET_COUNT;
            }
        }
        self.cursor
    }

    fn record(&mut self, now: Instant, success: bool) {
        let idx = self.advance(now);
        if success {
            self.buckets[idx].successes += 1;
        } else {
            self.buckets[idx].failures += 1;
        }
    }

    fn totals(&self) -> (u32, u32) {
        self.buckets
            .iter()
            .fold((0, 0), |(s, f), b| (s + b.successes, f + b.failures))
    }
}

/// A single circuit breaker instance guarding one dependency.
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitConfig,
    state: AtomicU8,
    window: Mutex<Window>,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: &'static str, config: CircuitConfig) -> Self {
        Self {
            name,
            config,
            state: AtomicU8::new(STATE_CLOSED),
            window: Mutex::new(Window::new()),
            opened_at: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Whether a call should be allowed through right now. Transitions
    /// open -> half-open when the reset timeout has elapsed, admitting a
    /// single probe.
    fn allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let mut opened_at = self.opened_at.lock().unwrap_or_else(|e| e.into_inner());
                let Some(opened) = *opened_at else {
                    return true;
                };
                if opened.elapsed() >= self.config.reset_timeout {
                    self.state.store(STATE_HALF_OPEN, Ordering::Release);
                    *opened_at = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        window.record(Instant::now(), true);
        drop(window);
        if self.state() == CircuitState::HalfOpen {
            self.state.store(STATE_CLOSED, Ordering::Release);
            tracing::info!(breaker = self.name, "circuit closed after successful probe");
        }
    }

    fn record_failure(&self) {
        let now = Instant::now();
        let (successes, failures) = {
            let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
            window.record(now, false);
            window.totals()
        };

        if self.state() == CircuitState::HalfOpen {
            self.trip(now);
            return;
        }

        let total = successes + failures;
        if total < self.config.volume_threshold {
            return;
        }
        let error_rate = (f64::from(failures) / f64::from(total)) * 100.0;
        if error_rate >= f64::from(self.config.error_threshold_percent) {
            self.trip(now);
        }
    }

    fn trip(&self, now: Instant) {
        self.state.store(STATE_OPEN, Ordering::Release);
        *self.opened_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
        tracing::warn!(breaker = self.name, "circuit open");
    }

    /// Run `f` through the breaker. Returns `Err(CircuitOpen)` immediately
    /// without invoking `f` when the circuit is open.
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitCallError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.allow() {
            crate::metrics::record_breaker_state(self.name, self.state());
            return Err(CircuitCallError::Open);
        }
        let result = match f.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitCallError::Failed(err))
            }
        };
        crate::metrics::record_breaker_state(self.name, self.state());
        result
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitCallError<E> {
    #[error("circuit is open")]
    Open,
    #[error(transparent)]
    Failed(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitConfig {
        CircuitConfig {
            error_threshold_percent: 50,
            reset_timeout: Duration::from_millis(50),
            volume_threshold: 5,
        }
    }

    #[tokio::test]
    async fn stays_closed_below_volume_threshold() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn trips_open_once_error_rate_and_volume_threshold_are_crossed() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..5 {
            let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = breaker.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitCallError::Open)));
    }

    #[tokio::test]
    async fn half_opens_after_reset_timeout_and_closes_on_success() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..5 {
            let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = breaker.call(async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..5 {
            let _ = breaker.call(async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = breaker.call(async { Err::<(), _>("still down") }).await;
        assert!(matches!(result, Err(CircuitCallError::Failed(_))));
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
