//! `GET /search` (spec §6).

use std::collections::BTreeSet;
use std::time::Instant;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, http::StatusCode};
use catalog_gateway_core::ProductId;
use chrono::Utc;

use crate::cache;
use crate::deadline::Deadline;
use crate::error::{self, AppError};
use crate::grouper;
use crate::query_builder;
use crate::request::{CanonicalQuery, CorrelationId, RawSearchParams};
use crate::response::{Pagination, SearchMeta, SearchResponse};
use crate::state::AppState;
use crate::suggest;

pub async fn search(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    Query(raw): Query<RawSearchParams>,
) -> Response {
    match handle(&state, &correlation_id, raw).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => error::render(&err, "/search", Some(&correlation_id)),
    }
}

async fn handle(
    state: &AppState,
    correlation_id: &CorrelationId,
    raw: RawSearchParams,
) -> Result<serde_json::Value, AppError> {
    let start = Instant::now();
    let query = CanonicalQuery::normalize(raw)?;
    let cache_key = query.cache_key("search");
    let deadline = Deadline::starting_now(state.request_timeout());

    if let Some(mut cached) = state.cache().get(&cache_key).await {
        crate::metrics::record_cache_hit("search");
        cache::rewrite_staleness(&mut cached, Utc::now(), correlation_id.as_str());
        return Ok(cached);
    }
    crate::metrics::record_cache_miss("search");

    let body = query_builder::build_search_body(&query, &state.config().ranking);
    let result = state.engine().search(&body, &deadline).await?;

    let product_ids: Vec<ProductId> = result
        .hits
        .iter()
        .map(|hit| hit.document.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let variant_options = state
        .catalog()
        .variant_options(&product_ids, &deadline, state.config().timeouts.database)
        .await;

    let results = grouper::group(&result.hits, &variant_options);
    let results = grouper::attach_variant_options(results, &result.hits, &variant_options);
    let next_cursor = grouper::next_cursor(&result.hits, query.limit);

    let suggestions = if result.total == 0 {
        let found = suggest::suggest(state.engine(), &query.text, &deadline).await;
        (!found.is_empty()).then_some(found)
    } else {
        None
    };

    let took = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let response = SearchResponse {
        meta: SearchMeta {
            timestamp: Utc::now(),
            correlation_id: Some(correlation_id.as_str().to_string()),
            pagination: Pagination {
                total: result.total,
                count: results.len(),
                next_cursor,
            },
            took,
        },
        data: results,
        suggestions,
    };

    let value = serde_json::to_value(&response)?;
    crate::metrics::record_search_latency(start.elapsed());

    // Detached so a client disconnect or the global request timeout can't
    // cancel the cache warm (spec §5 "Cancellation").
    let cache = state.cache().clone();
    let ttl = state.config().cache_ttl.search;
    let write_value = value.clone();
    tokio::spawn(async move {
        cache.set(&cache_key, &write_value, ttl).await;
    });

    Ok(value)
}
