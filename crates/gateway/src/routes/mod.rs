//! HTTP route handlers for the gateway.
//!
//! # Route Structure
//!
//! ```text
//! GET /<api-prefix>/v1/search          - Ranked product search
//! GET /<api-prefix>/v1/search/facets   - Facet aggregation over the same filters
//! GET /health                          - Component health map
//! GET /health/live                     - Liveness probe
//! GET /health/ready                    - Readiness probe
//! GET /metrics                         - Prometheus text exposition
//! ```

pub mod facets;
pub mod health;
pub mod search;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Routes nested under the configured `/<api-prefix>/v1` prefix.
#[must_use]
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(search::search))
        .route("/search/facets", get(facets::facets))
}

/// Health-probe routes, always at a fixed top-level path regardless of
/// `api_prefix` (spec §6).
#[must_use]
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
}
