//! Metrics & observability hooks (spec §7 "Observability"): cache
//! hit/miss counters, search latency histogram, per-breaker state gauges.
//!
//! Uses the `metrics` facade so the actual exporter (Prometheus, via
//! `metrics-exporter-prometheus`) is wired up once in `main`.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::circuit::CircuitState;

pub fn record_cache_hit(cache: &'static str) {
    counter!("gateway_cache_hits_total", "cache" => cache).increment(1);
}

pub fn record_cache_miss(cache: &'static str) {
    counter!("gateway_cache_misses_total", "cache" => cache).increment(1);
}

pub fn record_search_latency(duration: Duration) {
    histogram!("gateway_search_latency_seconds").record(duration.as_secs_f64());
}

pub fn record_rate_limit_exceeded() {
    counter!("gateway_rate_limit_exceeded_total").increment(1);
}

pub fn record_breaker_state(breaker: &'static str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("gateway_circuit_breaker_state", "breaker" => breaker).set(value);
}

/// Install the process-wide Prometheus recorder and return a handle whose
/// `render()` method produces the `/metrics` response body.
///
/// # Panics
///
/// Panics if a metrics recorder has already been installed in this
/// process, which would indicate a programming error at startup.
#[must_use]
pub fn install_recorder() -> metrics_exporter_prometheus::PrometheusHandle {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install the Prometheus metrics recorder")
}
