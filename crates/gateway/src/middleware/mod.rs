//! HTTP middleware stack for the gateway.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Correlation ID (read or generate `X-Correlation-ID`)
//! 4. Rate limiting (distributed token bucket, health probes exempt)

pub mod correlation_id;
pub mod rate_limit;

pub use correlation_id::correlation_id_middleware;
pub use rate_limit::rate_limit_middleware;
