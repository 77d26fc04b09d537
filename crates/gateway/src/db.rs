//! `PostgreSQL` connection pool for the relational catalog (variant
//! options lookup — spec §4.4).

use std::time::Duration;

use secrecy::ExposeSecret;
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a connection pool against `database_url`, bounding connection
/// establishment by `connect_timeout` (spec §5).
///
/// # Errors
///
/// Returns an error if the pool cannot establish its initial connection.
pub async fn create_pool(
    database_url: &SecretString,
    connect_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(connect_timeout)
        .connect(database_url.expose_secret())
        .await
}
