//! Rate limiting middleware (spec §4.8): every request is checked against
//! the distributed token bucket in [`crate::rate_limit`], except health
//! probes, which are exempt.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::rate_limit::RateLimitDecision;
use crate::state::AppState;

/// Applies the distributed rate limiter, keyed by client IP. Health-probe
/// paths bypass the limiter entirely (spec §4.8).
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.uri().path().starts_with("/health") {
        return Ok(next.run(request).await);
    }

    let client_ip = client_ip(&request, peer);

    match state.rate_limiter().check(&client_ip).await {
        RateLimitDecision::Allowed => Ok(next.run(request).await),
        RateLimitDecision::Exceeded => {
            crate::metrics::record_rate_limit_exceeded();
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// Prefer a trusted `X-Forwarded-For` header (set by the load balancer in
/// front of the gateway); fall back to the TCP peer address.
fn client_ip(request: &Request, peer: SocketAddr) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| peer.ip().to_string(), str::to_string)
}
