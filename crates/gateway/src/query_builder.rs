//! Query Builder (spec §4.2): translates a canonical query record into the
//! search engine's DSL, in both the search (ranked hits) and facet
//! (aggregation-only) shapes.

use serde_json::{Value, json};

use crate::config::RankingConfig;
use crate::cursor;
use crate::request::{CanonicalQuery, FilterValue};

/// Fixed price-range buckets for the `priceFrom` facet (spec §4.2).
const PRICE_BUCKETS: [(Option<f64>, Option<f64>, &str); 5] = [
    (None, Some(25.0), "under $25"),
    (Some(25.0), Some(50.0), "$25 - $50"),
    (Some(50.0), Some(100.0), "$50 - $100"),
    (Some(100.0), Some(200.0), "$100 - $200"),
    (Some(200.0), None, "$200 and up"),
];

const TEXT_FIELDS: &[&str] = &[
    "productName^3",
    "productDescription",
    "brand^2",
    "categoryName",
    "sku",
    "attributes.*",
];

/// Build the text-match clause shared by both the search and facet
/// variants. Fuzziness kicks in only after a 2-character verbatim prefix,
/// per spec, to keep fuzzy matching cheap.
fn text_clause(text: &str) -> Value {
    json!({
        "multi_match": {
            "query": text,
            "type": "best_fields",
            "fields": TEXT_FIELDS,
            "fuzziness": "AUTO",
            "prefix_length": 2,
        }
    })
}

/// Build the filter clauses (spec §4.2). Filters never affect score —
/// they are applied in a `bool.filter` context.
fn filter_clauses(query: &CanonicalQuery) -> Vec<Value> {
    let mut filters = Vec::new();

    if let Some(category_id) = &query.category_id {
        filters.push(json!({"term": {"categoryId": category_id}}));
    }
    if let Some(brand) = &query.brand {
        filters.push(json!({"term": {"brand.keyword": brand}}));
    }
    if let Some(range) = &query.price_range {
        let mut bounds = serde_json::Map::new();
        if let Some(min) = range.min {
            bounds.insert("gte".to_string(), json!(min.as_f64()));
        }
        if let Some(max) = range.max {
            bounds.insert("lte".to_string(), json!(max.as_f64()));
        }
        filters.push(json!({"range": {"priceFrom": bounds}}));
    }
    for (key, value) in &query.attribute_filters {
        let field = format!("attributes.{key}.keyword");
        filters.push(attribute_filter_clause(&field, value));
    }

    filters
}

fn attribute_filter_clause(field: &str, value: &FilterValue) -> Value {
    match value {
        FilterValue::Single(v) => json!({"term": {field: v}}),
        FilterValue::Multi(values) => json!({"terms": {field: values}}),
    }
}

/// Build the ranked-search request body: function-score query, sort, page
/// size, and `search_after` continuation (spec §4.2).
#[must_use]
pub fn build_search_body(query: &CanonicalQuery, ranking: &RankingConfig) -> Value {
    let bool_query = json!({
        "bool": {
            "must": [text_clause(&query.text)],
            "filter": filter_clauses(query),
        }
    });

    let function_score = json!({
        "function_score": {
            "query": bool_query,
            "field_value_factor": {
                "field": "sales30d",
                "factor": ranking.sales_boost_factor,
                "modifier": ranking.sales_boost_modifier,
                "missing": 1,
            },
            "score_mode": "multiply",
            "boost_mode": "multiply",
        }
    });

    let mut body = json!({
        "query": function_score,
        "size": query.limit,
        "sort": [
            {"_score": "desc"},
            {"productId": "asc"},
        ],
    });

    // A malformed cursor is treated as absent — pagination restarts,
    // never an error (spec §4.2).
    if let Some(cursor) = &query.cursor {
        if let Some(sort_values) = cursor::decode(cursor) {
            body["search_after"] = Value::Array(sort_values);
        }
    }

    body
}

/// Build the facet request body: same text + filters, `size = 0`, plus
/// one aggregation per requested facet key (spec §4.2).
#[must_use]
pub fn build_facets_body(query: &CanonicalQuery, facet_keys: &[String]) -> Value {
    let bool_query = json!({
        "bool": {
            "must": [text_clause(&query.text)],
            "filter": filter_clauses(query),
        }
    });

    let mut aggs = serde_json::Map::new();
    for key in facet_keys {
        aggs.insert(key.clone(), facet_aggregation(key));
    }

    json!({
        "query": bool_query,
        "size": 0,
        "aggs": aggs,
    })
}

fn facet_aggregation(key: &str) -> Value {
    if key == "priceFrom" {
        let ranges: Vec<Value> = PRICE_BUCKETS
            .iter()
            .map(|(from, to, label)| {
                let mut range = serde_json::Map::new();
                if let Some(from) = from {
                    range.insert("from".to_string(), json!(from));
                }
                if let Some(to) = to {
                    range.insert("to".to_string(), json!(to));
                }
                range.insert("key".to_string(), json!(label));
                Value::Object(range)
            })
            .collect();
        return json!({"range": {"field": "priceFrom", "ranges": ranges}});
    }

    let field = if let Some(attr) = key.strip_prefix("attributes.") {
        format!("attributes.{attr}.keyword")
    } else if key == "categoryId" {
        "categoryId".to_string()
    } else {
        format!("{key}.keyword")
    };

    json!({
        "terms": {
            "field": field,
            "size": 50,
            "order": {"_count": "desc"},
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn query(text: &str) -> CanonicalQuery {
        CanonicalQuery {
            text: text.to_string(),
            category_id: None,
            brand: None,
            price_range: None,
            attribute_filters: BTreeMap::new(),
            limit: 20,
            cursor: None,
        }
    }

    fn ranking() -> RankingConfig {
        RankingConfig {
            sales_boost_factor: 1.2,
            sales_boost_modifier: "log1p".to_string(),
        }
    }

    #[test]
    fn search_body_sets_size_from_limit() {
        let body = build_search_body(&query("shirt"), &ranking());
        assert_eq!(body["size"], 20);
    }

    #[test]
    fn search_body_sorts_by_score_then_product_id() {
        let body = build_search_body(&query("shirt"), &ranking());
        assert_eq!(body["sort"][0]["_score"], "desc");
        assert_eq!(body["sort"][1]["productId"], "asc");
    }

    #[test]
    fn search_body_omits_search_after_without_cursor() {
        let body = build_search_body(&query("shirt"), &ranking());
        assert!(body.get("search_after").is_none());
    }

    #[test]
    fn search_body_includes_search_after_from_a_valid_cursor() {
        let mut q = query("shirt");
        q.cursor = Some(cursor::encode(&[Value::from(3.2), Value::from(7)]));
        let body = build_search_body(&q, &ranking());
        assert_eq!(body["search_after"], json!([3.2, 7]));
    }

    #[test]
    fn search_body_ignores_a_malformed_cursor() {
        let mut q = query("shirt");
        q.cursor = Some("not a real cursor".to_string());
        let body = build_search_body(&q, &ranking());
        assert!(body.get("search_after").is_none());
    }

    #[test]
    fn facets_body_builds_price_range_buckets() {
        let body = build_facets_body(&query("shirt"), &["priceFrom".to_string()]);
        let ranges = body["aggs"]["priceFrom"]["range"]["ranges"].as_array().unwrap();
        assert_eq!(ranges.len(), 5);
    }

    #[test]
    fn facets_body_builds_terms_aggregation_for_brand() {
        let body = build_facets_body(&query("shirt"), &["brand".to_string()]);
        assert_eq!(body["aggs"]["brand"]["terms"]["field"], "brand.keyword");
        assert_eq!(body["aggs"]["brand"]["terms"]["size"], 50);
    }

    #[test]
    fn attribute_filter_single_value_becomes_term_clause() {
        let mut q = query("shirt");
        q.attribute_filters.insert("color".to_string(), FilterValue::Single("red".to_string()));
        let body = build_search_body(&q, &ranking());
        let filters = body["query"]["function_score"]["query"]["bool"]["filter"].as_array().unwrap();
        assert!(filters.iter().any(|f| f["term"].get("attributes.color.keyword").is_some()));
    }

    #[test]
    fn attribute_filter_multi_value_becomes_terms_clause() {
        let mut q = query("shirt");
        q.attribute_filters.insert(
            "color".to_string(),
            FilterValue::Multi(vec!["red".to_string(), "blue".to_string()]),
        );
        let body = build_search_body(&q, &ranking());
        let filters = body["query"]["function_score"]["query"]["bool"]["filter"].as_array().unwrap();
        assert!(filters.iter().any(|f| f["terms"].get("attributes.color.keyword").is_some()));
    }
}
