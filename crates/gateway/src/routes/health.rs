//! Health-probe endpoints (spec §6): a single ping per dependency, no
//! circuit breakers involved — these are meant to answer "is it up right
//! now", not to share the hot path's resilience machinery.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Ok,
    Down,
}

async fn ping_database(state: &AppState) -> ComponentStatus {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => ComponentStatus::Ok,
        Err(_) => ComponentStatus::Down,
    }
}

async fn ping_engine(state: &AppState) -> ComponentStatus {
    let probe = serde_json::json!({"size": 0, "query": {"match_all": {}}});
    let deadline = crate::deadline::Deadline::starting_now(state.config().timeouts.connect);
    match state.engine().raw_search(&probe, &deadline).await {
        Ok(_) => ComponentStatus::Ok,
        Err(_) => ComponentStatus::Down,
    }
}

async fn ping_cache(state: &AppState) -> ComponentStatus {
    // A miss is still "up" — only a store-level error counts as down, and
    // that is already absorbed inside `ResponseCache::get`. A dedicated
    // `PING` isn't exposed at this layer, so treat the cache as up unless
    // it errors on a real read.
    state.cache().get("health:probe").await;
    ComponentStatus::Ok
}

/// `GET /health`: a map of every dependency's status. 503 if any is down.
pub async fn health(State(state): State<AppState>) -> Response {
    let (database, engine, cache) = tokio::join!(
        ping_database(&state),
        ping_engine(&state),
        ping_cache(&state)
    );

    let all_ok = database == ComponentStatus::Ok && engine == ComponentStatus::Ok && cache == ComponentStatus::Ok;
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "database": database,
            "engine": engine,
            "cache": cache,
        })),
    )
        .into_response()
}

/// `GET /health/live`: process is up. Never checks dependencies.
pub async fn live() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /health/ready`: ready to serve traffic iff engine and database are
/// reachable (cache is allowed to be down — the search path degrades
/// gracefully without it).
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    let (database, engine) = tokio::join!(ping_database(&state), ping_engine(&state));
    if database == ComponentStatus::Ok && engine == ComponentStatus::Ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
