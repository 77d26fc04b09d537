//! `GET /search/facets` (spec §6).

use std::time::Instant;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, http::StatusCode};
use chrono::Utc;

use crate::deadline::Deadline;
use crate::error::{self, AppError};
use crate::query_builder;
use crate::request::{CorrelationId, FacetQuery, RawFacetParams};
use crate::response::{FacetsMeta, FacetsResponse, parse_facets};
use crate::state::AppState;

pub async fn facets(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    Query(raw): Query<RawFacetParams>,
) -> Response {
    match handle(&state, &correlation_id, raw).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => error::render(&err, "/search/facets", Some(&correlation_id)),
    }
}

async fn handle(
    state: &AppState,
    correlation_id: &CorrelationId,
    raw: RawFacetParams,
) -> Result<serde_json::Value, AppError> {
    let start = Instant::now();
    let query = FacetQuery::normalize(raw)?;
    let cache_key = query.cache_key();
    let deadline = Deadline::starting_now(state.request_timeout());

    if let Some(mut cached) = state.cache().get(&cache_key).await {
        crate::metrics::record_cache_hit("facets");
        crate::cache::rewrite_staleness(&mut cached, Utc::now(), correlation_id.as_str());
        return Ok(cached);
    }
    crate::metrics::record_cache_miss("facets");

    let body = query_builder::build_facets_body(&query.search, &query.facet_keys);
    let raw_result = state.engine().raw_search(&body, &deadline).await?;

    let total_matches = raw_result
        .pointer("/hits/total/value")
        .and_then(serde_json::Value::as_u64)
        .or_else(|| raw_result.pointer("/hits/total").and_then(serde_json::Value::as_u64))
        .unwrap_or(0);

    let data = parse_facets(&raw_result, &query.facet_keys);
    let took = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let response = FacetsResponse {
        data,
        meta: FacetsMeta {
            timestamp: Utc::now(),
            correlation_id: Some(correlation_id.as_str().to_string()),
            total_matches,
            took,
        },
    };

    let value = serde_json::to_value(&response)?;

    // Detached so a client disconnect or the global request timeout can't
    // cancel the cache warm (spec §5 "Cancellation").
    let cache = state.cache().clone();
    let ttl = state.config().cache_ttl.facets;
    let write_value = value.clone();
    tokio::spawn(async move {
        cache.set(&cache_key, &write_value, ttl).await;
    });

    Ok(value)
}
