//! End-to-end exercises of the search/facet pipeline against a mocked
//! engine cluster (spec §8 scenarios 1, 4, 5): request normalization,
//! engine DSL, response parsing, grouping, and the circuit breaker, all
//! wired together the way `routes/search.rs` and `routes/facets.rs` use
//! them. The catalog enricher, response cache, and rate limiter are
//! exercised separately in their own unit tests since they depend on
//! Postgres/Redis rather than an HTTP engine.

use std::collections::HashMap;
use std::time::Duration;

use catalog_search_gateway::config::{CircuitConfig, EngineConfig};
use catalog_search_gateway::deadline::Deadline;
use catalog_search_gateway::engine::EngineClient;
use catalog_search_gateway::error::AppError;
use catalog_search_gateway::request::{CanonicalQuery, FacetQuery, RawFacetParams, RawSearchParams};
use catalog_search_gateway::response::parse_facets;
use catalog_search_gateway::{grouper, query_builder};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn circuit_config() -> CircuitConfig {
    CircuitConfig {
        error_threshold_percent: 50,
        reset_timeout: Duration::from_millis(100),
        volume_threshold: 5,
    }
}

fn engine_client(node: String) -> EngineClient {
    EngineClient::new(
        &EngineConfig {
            node,
            index_variants: "variants".to_string(),
        },
        Duration::from_secs(5),
        Duration::from_secs(1),
        circuit_config(),
    )
}

fn raw_search_params(q: &str) -> RawSearchParams {
    RawSearchParams {
        q: q.to_string(),
        category_id: None,
        brand: None,
        price_min: None,
        price_max: None,
        filters: None,
        limit: None,
        cursor: None,
    }
}

fn shirt_hit(variant_id: i64, sku: &str) -> serde_json::Value {
    json!({
        "_score": 4.1,
        "sort": [4.1, 1],
        "_source": {
            "variantId": variant_id,
            "productId": 1,
            "sku": sku,
            "productName": "Classic Cotton T-Shirt",
            "productDescription": "soft cotton tee",
            "brand": "StyleBasics",
            "categoryName": "T-Shirts",
            "categoryId": "shirts",
            "attributes": {"color": "Red", "size": sku},
            "imageUrl": null,
            "priceFrom": "19.99",
            "totalStock": 10,
            "sales30d": 40,
            "offers": [{
                "offerId": variant_id,
                "supplierId": 1,
                "supplierName": "Acme",
                "supplierRating": 4.5,
                "price": "19.99",
                "stock": 10
            }],
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        }
    })
}

/// Scenario 1: a single product with 3 variants, one matching text query.
#[tokio::test]
async fn basic_search_groups_three_variants_into_one_product() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/variants/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {
                "total": {"value": 3, "relation": "eq"},
                "hits": [shirt_hit(1, "S"), shirt_hit(2, "M"), shirt_hit(3, "L")],
            }
        })))
        .mount(&server)
        .await;

    let engine = engine_client(server.uri());
    let query = CanonicalQuery::normalize(raw_search_params("shirt")).expect("valid query");
    let ranking = catalog_search_gateway::config::RankingConfig {
        sales_boost_factor: 1.2,
        sales_boost_modifier: "log1p".to_string(),
    };
    let body = query_builder::build_search_body(&query, &ranking);
    let deadline = Deadline::starting_now(Duration::from_secs(5));

    let result = engine.search(&body, &deadline).await.expect("engine search succeeds");
    assert_eq!(result.total, 3);

    let results = grouper::group(&result.hits, &HashMap::new());
    assert_eq!(results.len(), 1, "three variants of one product collapse into one result");
    assert_eq!(results[0].best_offer.price.to_string(), "19.99");
    assert!(grouper::next_cursor(&result.hits, query.limit).is_none());
}

/// Scenario 4: a facet query against a brand-bucketed aggregation.
#[tokio::test]
async fn facets_pipeline_parses_brand_buckets_ordered_by_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/variants/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {"total": {"value": 100, "relation": "eq"}, "hits": []},
            "aggregations": {
                "brand": {
                    "buckets": [
                        {"key": "Nike", "doc_count": 50},
                        {"key": "Adidas", "doc_count": 30},
                        {"key": "Puma", "doc_count": 20},
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let engine = engine_client(server.uri());
    let facet_query = FacetQuery::normalize(RawFacetParams {
        search: raw_search_params("shirt"),
        facet_keys: "brand".to_string(),
    })
    .expect("valid facet query");

    let body = query_builder::build_facets_body(&facet_query.search, &facet_query.facet_keys);
    let deadline = Deadline::starting_now(Duration::from_secs(5));
    let raw = engine.raw_search(&body, &deadline).await.expect("facet query succeeds");

    let facets = parse_facets(&raw, &facet_query.facet_keys);
    let catalog_search_gateway::response::Facet::Terms { buckets, .. } = &facets[0] else {
        panic!("expected a terms facet");
    };
    assert_eq!(buckets.len(), 3);
    assert_eq!(buckets[0].count, 50);
    assert!(buckets[0].count >= buckets[1].count && buckets[1].count >= buckets[2].count);
}

/// Scenario 5: the circuit opens after repeated engine failures and
/// fails fast without hitting the engine again until the reset timeout.
#[tokio::test]
async fn circuit_opens_after_repeated_failures_and_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/variants/_search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = engine_client(server.uri());
    let deadline = Deadline::starting_now(Duration::from_secs(5));
    let body = json!({"query": {"match_all": {}}});

    for _ in 0..5 {
        let err = engine.raw_search(&body, &deadline).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    assert_eq!(server.received_requests().await.unwrap().len(), 5);

    // The 6th call must not reach the engine at all: the breaker is open.
    let err = engine.raw_search(&body, &deadline).await.unwrap_err();
    assert!(matches!(err, AppError::ServiceUnavailable(_)));
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        5,
        "an open circuit must not issue another HTTP request"
    );
}
