//! Gateway configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string (relational catalog)
//! - `OPENSEARCH_NODE` - Base URL of the search engine cluster
//!
//! ## Optional (every knob has a default)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8080)
//! - `API_PREFIX` - Path segment before `/v1` (default: api)
//! - `OPENSEARCH_INDEX_VARIANTS` - Index name for variant documents (default: variants)
//! - `REDIS_HOST` / `REDIS_PORT` / `REDIS_PASSWORD` - Shared cache + rate-limiter store
//! - `THROTTLE_TTL` - Rate-limit window, seconds (default: 60)
//! - `THROTTLE_LIMIT` - Requests per window per IP (default: 100)
//! - `CACHE_TTL_SEARCH` - Search response cache TTL, seconds (default: 300)
//! - `CACHE_TTL_FACETS` - Facet response cache TTL, seconds (default: 600)
//! - `SEARCH_SALES_BOOST_FACTOR` - `field_value_factor` factor (default: 1.2)
//! - `SEARCH_SALES_BOOST_MODIFIER` - `field_value_factor` modifier (default: log1p)
//! - `TIMEOUT_REQUEST` - Global per-request deadline, ms (default: 30000)
//! - `TIMEOUT_OPENSEARCH` - Engine call timeout, ms (default: 15000)
//! - `TIMEOUT_DATABASE` - Relational call timeout, ms (default: 10000)
//! - `TIMEOUT_CONNECT` - Connection establishment timeout, ms (default: 5000)
//! - `CIRCUIT_ERROR_THRESHOLD` - Error-rate percentage that trips a breaker (default: 50)
//! - `CIRCUIT_RESET_TIMEOUT` - Open -> half-open cooldown, ms (default: 30000)
//! - `CIRCUIT_VOLUME_THRESHOLD` - Minimum requests in the rolling window before tripping (default: 5)
//! - `SENTRY_DSN` - Error-tracking endpoint (unset disables Sentry reporting)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Gateway application configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: IpAddr,
    pub port: u16,
    pub api_prefix: String,
    pub database_url: SecretString,
    pub engine: EngineConfig,
    pub redis: RedisConfig,
    pub throttle: ThrottleConfig,
    pub cache_ttl: CacheTtlConfig,
    pub ranking: RankingConfig,
    pub timeouts: TimeoutConfig,
    pub circuit: CircuitConfig,
    pub sentry_dsn: Option<String>,
}

/// Search engine cluster configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub node: String,
    pub index_variants: String,
}

/// Shared Redis configuration, backing both the response cache and the
/// distributed rate limiter.
#[derive(Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "password",
                &self.password.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl RedisConfig {
    /// Build a `redis://` connection URL from the configured parts.
    #[must_use]
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}",
                password.expose_secret(),
                self.host,
                self.port
            ),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

/// Rate-limiter configuration (spec §4.8).
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    pub ttl: Duration,
    pub limit: u32,
}

/// Response cache TTLs (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct CacheTtlConfig {
    pub search: Duration,
    pub facets: Duration,
}

/// Sales-boost function-score configuration (spec §4.2).
#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub sales_boost_factor: f64,
    pub sales_boost_modifier: String,
}

/// Per-dependency timeouts (spec §5).
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub request: Duration,
    pub opensearch: Duration,
    pub database: Duration,
    pub connect: Duration,
}

/// Circuit breaker tuning, shared by every breaker instance (spec §5).
#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    pub error_threshold_percent: u8,
    pub reset_timeout: Duration,
    pub volume_threshold: u32,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a variable
    /// fails to parse into its expected type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = parse_env_or_default("PORT", 8080)?;
        let api_prefix = get_env_or_default("API_PREFIX", "api");
        let database_url = get_required_secret("DATABASE_URL")?;

        let engine = EngineConfig {
            node: get_required_env("OPENSEARCH_NODE")?,
            index_variants: get_env_or_default("OPENSEARCH_INDEX_VARIANTS", "variants"),
        };

        let redis = RedisConfig {
            host: get_env_or_default("REDIS_HOST", "127.0.0.1"),
            port: parse_env_or_default("REDIS_PORT", 6379)?,
            password: get_optional_env("REDIS_PASSWORD").map(SecretString::from),
        };

        let throttle = ThrottleConfig {
            ttl: Duration::from_secs(parse_env_or_default("THROTTLE_TTL", 60)?),
            limit: parse_env_or_default("THROTTLE_LIMIT", 100)?,
        };

        let cache_ttl = CacheTtlConfig {
            search: Duration::from_secs(parse_env_or_default("CACHE_TTL_SEARCH", 300)?),
            facets: Duration::from_secs(parse_env_or_default("CACHE_TTL_FACETS", 600)?),
        };

        let ranking = RankingConfig {
            sales_boost_factor: parse_env_or_default("SEARCH_SALES_BOOST_FACTOR", 1.2)?,
            sales_boost_modifier: get_env_or_default("SEARCH_SALES_BOOST_MODIFIER", "log1p"),
        };

        let timeouts = TimeoutConfig {
            request: Duration::from_millis(parse_env_or_default("TIMEOUT_REQUEST", 30_000)?),
            opensearch: Duration::from_millis(parse_env_or_default("TIMEOUT_OPENSEARCH", 15_000)?),
            database: Duration::from_millis(parse_env_or_default("TIMEOUT_DATABASE", 10_000)?),
            connect: Duration::from_millis(parse_env_or_default("TIMEOUT_CONNECT", 5_000)?),
        };

        let circuit = CircuitConfig {
            error_threshold_percent: parse_env_or_default("CIRCUIT_ERROR_THRESHOLD", 50)?,
            reset_timeout: Duration::from_millis(parse_env_or_default(
                "CIRCUIT_RESET_TIMEOUT",
                30_000,
            )?),
            volume_threshold: parse_env_or_default("CIRCUIT_VOLUME_THRESHOLD", 5)?,
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            host,
            port,
            api_prefix,
            database_url,
            engine,
            redis,
            throttle,
            cache_ttl,
            ranking,
            timeouts,
            circuit,
            sentry_dsn,
        })
    }

    /// The socket address to bind the HTTP listener to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The full API path prefix, e.g. `/api/v1`.
    #[must_use]
    pub fn api_path_prefix(&self) -> String {
        format!("/{}/v1", self.api_prefix.trim_matches('/'))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    get_required_env(key).map(SecretString::from)
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn redis_connection_url_without_password() {
        let redis = RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
        };
        assert_eq!(redis.connection_url(), "redis://localhost:6379");
    }

    #[test]
    fn redis_connection_url_with_password() {
        let redis = RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: Some(SecretString::from("hunter2")),
        };
        assert_eq!(redis.connection_url(), "redis://:hunter2@localhost:6379");
    }

    #[test]
    fn redis_debug_redacts_password() {
        let redis = RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: Some(SecretString::from("hunter2")),
        };
        let debug = format!("{redis:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn api_path_prefix_strips_slashes() {
        let api_prefix = "/api/".to_string();
        assert_eq!(
            api_prefix.trim_matches('/').to_string(),
            "api".to_string()
        );
    }

    #[test]
    fn parse_env_or_default_uses_default_when_unset() {
        // SAFETY: test runs single-threaded w.r.t. this specific var name.
        unsafe {
            std::env::remove_var("GATEWAY_TEST_UNSET_VAR");
        }
        let value: u64 = parse_env_or_default("GATEWAY_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
