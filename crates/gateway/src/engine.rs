//! Search Engine Adapter (spec §4.3): a thin wrapper over the engine
//! cluster's HTTP search DSL, guarded by a circuit breaker.

use std::collections::BTreeMap;
use std::time::Duration;

use catalog_gateway_core::{OfferId, Price, ProductId, SupplierId, VariantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::circuit::{CircuitBreaker, CircuitCallError};
use crate::config::{CircuitConfig, EngineConfig};
use crate::deadline::Deadline;
use crate::error::AppError;

/// A supplier's price + stock position for a variant (spec §3, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(rename = "offerId")]
    pub offer_id: OfferId,
    #[serde(rename = "supplierId")]
    pub supplier_id: SupplierId,
    #[serde(rename = "supplierName")]
    pub supplier_name: String,
    #[serde(rename = "supplierRating")]
    pub supplier_rating: f64,
    pub price: Price,
    pub stock: i64,
}

/// The denormalized per-variant document stored in the engine (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDocument {
    #[serde(rename = "variantId")]
    pub variant_id: VariantId,
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    pub sku: String,
    #[serde(rename = "productName")]
    pub product_name: String,
    #[serde(rename = "productDescription")]
    pub product_description: String,
    pub brand: String,
    #[serde(rename = "categoryName")]
    pub category_name: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(rename = "priceFrom")]
    pub price_from: Price,
    #[serde(rename = "totalStock")]
    pub total_stock: i64,
    pub sales30d: i64,
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// One engine hit: the document, its relevance score, and the sort tuple
/// used for `search_after` continuation.
#[derive(Debug, Clone)]
pub struct VariantHit {
    pub document: VariantDocument,
    pub score: f64,
    pub sort: Vec<Value>,
}

/// A normalized search response.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub hits: Vec<VariantHit>,
    pub total: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("engine returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to parse engine response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Client for the search engine cluster, wrapping every call in a circuit
/// breaker (spec §5, breaker name `engine-search`).
pub struct EngineClient {
    http: reqwest::Client,
    node: String,
    index: String,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl EngineClient {
    #[must_use]
    pub fn new(config: &EngineConfig, timeout: Duration, connect_timeout: Duration, circuit: CircuitConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            node: config.node.trim_end_matches('/').to_string(),
            index: config.index_variants.clone(),
            timeout,
            breaker: CircuitBreaker::new("engine-search", circuit),
        }
    }

    /// Execute a structured search query, returning normalized hits.
    pub async fn search(&self, body: &Value, deadline: &Deadline) -> Result<SearchResult, AppError> {
        let raw = self.raw_search(body, deadline).await?;
        Ok(parse_search_response(&raw))
    }

    /// Execute a query and return the raw engine body, for suggestion
    /// queries that need the aggregation payload shape directly.
    pub async fn raw_search(&self, body: &Value, deadline: &Deadline) -> Result<Value, AppError> {
        let result = self
            .breaker
            .call(async { self.execute(body, deadline).await })
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(CircuitCallError::Open) => Err(AppError::ServiceUnavailable(Box::new(
                std::io::Error::other("engine-search circuit is open"),
            ))),
            Err(CircuitCallError::Failed(err)) => Err(AppError::ServiceUnavailable(Box::new(err))),
        }
    }

    async fn execute(&self, body: &Value, deadline: &Deadline) -> Result<Value, EngineError> {
        let url = format!("{}/{}/_search", self.node, self.index);
        let request = self.http.post(&url).json(body).send();

        let response = deadline
            .race(self.timeout, request)
            .await
            .map_err(|_| EngineError::DeadlineExceeded)??;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status(status));
        }

        Ok(response.json::<Value>().await?)
    }
}

fn parse_search_response(raw: &Value) -> SearchResult {
    let total = raw
        .get("hits")
        .and_then(|h| h.get("total"))
        .map_or(0, normalize_total);

    let hits = raw
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .map(|hits| hits.iter().filter_map(parse_hit).collect())
        .unwrap_or_default();

    SearchResult { hits, total }
}

/// The engine's `hits.total` is either a bare number (legacy) or an object
/// `{value, relation}` (modern) — spec §4.3 requires normalizing both to a
/// single integer.
fn normalize_total(total: &Value) -> u64 {
    match total {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::Object(obj) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    }
}

fn parse_hit(hit: &Value) -> Option<VariantHit> {
    let document: VariantDocument = serde_json::from_value(hit.get("_source")?.clone()).ok()?;
    let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0);
    let sort = hit
        .get("sort")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Some(VariantHit {
        document,
        score,
        sort,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_number_total() {
        assert_eq!(normalize_total(&Value::from(42)), 42);
    }

    #[test]
    fn normalizes_object_total() {
        let value = serde_json::json!({"value": 17, "relation": "eq"});
        assert_eq!(normalize_total(&value), 17);
    }

    #[test]
    fn parse_search_response_extracts_hits_and_total() {
        let raw = serde_json::json!({
            "hits": {
                "total": {"value": 1, "relation": "eq"},
                "hits": [{
                    "_score": 3.2,
                    "sort": [3.2, 7],
                    "_source": {
                        "variantId": 7,
                        "productId": 1,
                        "sku": "RED-M",
                        "productName": "Classic Cotton T-Shirt",
                        "productDescription": "soft cotton tee",
                        "brand": "StyleBasics",
                        "categoryName": "T-Shirts",
                        "categoryId": "shirts",
                        "attributes": {"color": "Red", "size": "M"},
                        "imageUrl": null,
                        "priceFrom": "19.99",
                        "totalStock": 10,
                        "sales30d": 40,
                        "offers": [{
                            "offerId": 1, "supplierId": 1, "supplierName": "Acme",
                            "supplierRating": 4.5, "price": "19.99", "stock": 10
                        }],
                        "createdAt": "2026-01-01T00:00:00Z",
                        "updatedAt": "2026-01-01T00:00:00Z"
                    }
                }]
            }
        });

        let result = parse_search_response(&raw);
        assert_eq!(result.total, 1);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].document.sku, "RED-M");
        assert_eq!(result.hits[0].sort, vec![Value::from(3.2), Value::from(7)]);
    }
}
