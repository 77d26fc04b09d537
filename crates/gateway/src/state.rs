//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::cache::ResponseCache;
use crate::catalog::CatalogEnricher;
use crate::config::GatewayConfig;
use crate::engine::EngineClient;
use crate::rate_limit::RateLimiter;

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("redis connection failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; every field here is itself a connection
/// pool or process-singleton client (spec §5 "Resource sharing") so no
/// request holds exclusive access to a dependency across a suspension
/// point.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: GatewayConfig,
    engine: EngineClient,
    catalog: CatalogEnricher,
    cache: ResponseCache,
    rate_limiter: RateLimiter,
    pool: PgPool,
    metrics: PrometheusHandle,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial Redis connection cannot be
    /// established.
    pub async fn new(
        config: GatewayConfig,
        pool: PgPool,
        metrics: PrometheusHandle,
    ) -> Result<Self, AppStateError> {
        let engine = EngineClient::new(
            &config.engine,
            config.timeouts.opensearch,
            config.timeouts.connect,
            config.circuit,
        );
        let catalog = CatalogEnricher::new(pool.clone(), config.circuit);

        let connection_url = config.redis.connection_url();
        let cache = ResponseCache::connect(&connection_url).await?;

        let redis_client = RedisClient::open(connection_url)?;
        let rate_limiter_manager = redis_client.get_connection_manager().await?;
        let rate_limiter = RateLimiter::new(
            rate_limiter_manager,
            config.throttle.limit,
            config.throttle.ttl,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                engine,
                catalog,
                cache,
                rate_limiter,
                pool,
                metrics,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn engine(&self) -> &EngineClient {
        &self.inner.engine
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogEnricher {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn metrics(&self) -> &PrometheusHandle {
        &self.inner.metrics
    }

    /// Global per-request deadline (spec §5).
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.inner.config.timeouts.request
    }
}
