//! Response Cache (spec §4.6): get/set/delete over a shared Redis store,
//! with the staleness-acknowledgment rewrite applied on every hit.

use std::time::Duration;

use redis::AsyncCommands;
use serde_json::Value;

/// Wraps a Redis connection manager. All operations absorb failures: a
/// cache error degrades to "miss" on read and "no-op" on write (spec §5
/// fallback policy for the `cache` dependency) — it is never surfaced to
/// the client.
#[derive(Clone)]
pub struct ResponseCache {
    manager: redis::aio::ConnectionManager,
}

impl ResponseCache {
    /// # Errors
    ///
    /// Returns an error only if the initial connection cannot be
    /// established; once connected, the connection manager reconnects
    /// transparently and ongoing failures are absorbed by the caller.
    pub async fn connect(connection_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }

    /// Fetch a cached JSON value, returning `None` on a miss or on any
    /// backing-store failure.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = self.manager.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, key, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a JSON value with a TTL. Failures are logged and swallowed.
    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        let Ok(raw) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.manager.clone();
        let ttl_secs = ttl.as_secs().max(1);
        if let Err(err) = conn.set_ex::<_, _, ()>(key, raw, ttl_secs).await {
            tracing::warn!(error = %err, key, "cache write failed, continuing without caching");
        }
    }

    /// Delete a single key. Failures are logged and swallowed.
    pub async fn delete(&self, key: &str) {
        let mut conn = self.manager.clone();
        if let Err(err) = conn.del::<_, ()>(key).await {
            tracing::warn!(error = %err, key, "cache delete failed");
        }
    }

    /// Delete every key matching `pattern` (e.g. `search:*`) via
    /// incremental `SCAN`, avoiding `KEYS` blocking the shared store.
    pub async fn delete_pattern(&self, pattern: &str) {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = match redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
            {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(error = %err, pattern, "cache scan failed");
                    return;
                }
            };

            if !keys.is_empty() {
                if let Err(err) = conn.del::<_, ()>(keys).await {
                    tracing::warn!(error = %err, pattern, "cache pattern delete failed");
                }
            }

            if next_cursor == 0 {
                return;
            }
            cursor = next_cursor;
        }
    }
}

/// Staleness acknowledgment (spec §4.6): on a cache hit, the response's
/// `meta.timestamp` and `meta.correlationId` are overwritten with the
/// current request's values. `meta.took` is left untouched so a cached
/// response visibly declares its near-zero latency.
pub fn rewrite_staleness(cached: &mut Value, now: chrono::DateTime<chrono::Utc>, correlation_id: &str) {
    if let Some(meta) = cached.get_mut("meta").and_then(Value::as_object_mut) {
        meta.insert(
            "timestamp".to_string(),
            Value::String(now.to_rfc3339()),
        );
        meta.insert(
            "correlationId".to_string(),
            Value::String(correlation_id.to_string()),
        );
    }
}
