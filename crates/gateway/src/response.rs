//! Response envelopes (spec §6): `SearchResponse`, `FacetsResponse`, and
//! the `Facet` union, plus the aggregation-result parsing that turns a raw
//! engine body into the latter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::grouper::ProductResult;
use crate::suggest::Suggestion;

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub count: usize,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMeta {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub pagination: Pagination,
    pub took: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub data: Vec<ProductResult>,
    pub meta: SearchMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetsMeta {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "correlationId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(rename = "totalMatches")]
    pub total_matches: u64,
    pub took: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetsResponse {
    pub data: Vec<Facet>,
    pub meta: FacetsMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermBucket {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeBucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
    pub count: u64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Facet {
    #[serde(rename = "terms")]
    Terms {
        key: String,
        name: String,
        buckets: Vec<TermBucket>,
    },
    #[serde(rename = "range")]
    Range {
        key: String,
        name: String,
        ranges: Vec<RangeBucket>,
    },
}

/// Human-readable facet display name (spec §6 `Facet.name`).
fn display_name(key: &str) -> String {
    match key {
        "priceFrom" => "Price".to_string(),
        "categoryId" => "Category ID".to_string(),
        "categoryName" => "Category".to_string(),
        "brand" => "Brand".to_string(),
        other => other
            .strip_prefix("attributes.")
            .map_or_else(|| other.to_string(), titlecase),
    }
}

fn titlecase(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Parse the engine's `aggregations` block into the response-level
/// `Facet` list, in the order the caller requested the keys (spec §4.2,
/// §6).
#[must_use]
pub fn parse_facets(raw: &Value, facet_keys: &[String]) -> Vec<Facet> {
    facet_keys
        .iter()
        .filter_map(|key| {
            let agg = raw.pointer(&format!("/aggregations/{key}"))?;
            Some(if key == "priceFrom" {
                parse_range_facet(key, agg)
            } else {
                parse_terms_facet(key, agg)
            })
        })
        .collect()
}

fn parse_terms_facet(key: &str, agg: &Value) -> Facet {
    let buckets = agg
        .get("buckets")
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|bucket| {
                    let value = bucket.get("key")?.as_str()?.to_string();
                    let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
                    Some(TermBucket { value, count })
                })
                .collect()
        })
        .unwrap_or_default();

    Facet::Terms {
        key: key.to_string(),
        name: display_name(key),
        buckets,
    }
}

fn parse_range_facet(key: &str, agg: &Value) -> Facet {
    let ranges = agg
        .get("buckets")
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .map(|bucket| RangeBucket {
                    from: bucket.get("from").and_then(Value::as_f64),
                    to: bucket.get("to").and_then(Value::as_f64),
                    count: bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
                    label: bucket
                        .get("key")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Facet::Range {
        key: key.to_string(),
        name: display_name(key),
        ranges,
    }
}
