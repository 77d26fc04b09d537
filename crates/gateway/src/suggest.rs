//! Suggestion Pipeline (spec §4.7): runs only when a search's `total == 0`,
//! combining a phrase suggester and aggregation-derived brand/category
//! suggestions. Failure of either strategy yields an empty contribution,
//! never an error.

use serde::Serialize;
use serde_json::{Value, json};

use crate::deadline::Deadline;
use crate::engine::EngineClient;

const MAX_SUGGESTIONS: usize = 5;
const MAX_PER_STRATEGY: i64 = 3;

/// A single suggested follow-up query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub term: String,
    #[serde(rename = "estimatedCount", skip_serializing_if = "Option::is_none")]
    pub estimated_count: Option<u64>,
}

/// Run both suggestion strategies against `query_text` and return a
/// deduplicated, truncated list. Never returns an error: an engine
/// failure for either strategy just contributes nothing.
pub async fn suggest(engine: &EngineClient, query_text: &str, deadline: &Deadline) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    match engine.raw_search(&phrase_suggest_body(query_text), deadline).await {
        Ok(raw) => suggestions.extend(parse_phrase_suggestions(&raw)),
        Err(err) => tracing::debug!(error = %err, "phrase suggester unavailable"),
    }

    match engine
        .raw_search(&aggregation_suggest_body(query_text), deadline)
        .await
    {
        Ok(raw) => suggestions.extend(parse_aggregation_suggestions(&raw, query_text)),
        Err(err) => tracing::debug!(error = %err, "aggregation suggester unavailable"),
    }

    dedup_and_truncate(suggestions)
}

fn phrase_suggest_body(query_text: &str) -> Value {
    json!({
        "suggest": {
            "text": query_text,
            "phrase-suggest": {
                "phrase": {
                    "field": "productName",
                    "size": MAX_PER_STRATEGY,
                    "gram_size": 2,
                    "direct_generator": [{
                        "field": "productName",
                        "suggest_mode": "popular",
                    }],
                },
            },
        },
    })
}

fn aggregation_suggest_body(query_text: &str) -> Value {
    json!({
        "size": 0,
        "query": {
            "multi_match": {
                "query": query_text,
                "fields": ["productName^3", "brand^2", "categoryName"],
                "fuzziness": "AUTO",
            },
        },
        "aggs": {
            "brands": {"terms": {"field": "brand.keyword", "size": MAX_PER_STRATEGY}},
            "categories": {"terms": {"field": "categoryName.keyword", "size": MAX_PER_STRATEGY}},
        },
    })
}

fn parse_phrase_suggestions(raw: &Value) -> Vec<Suggestion> {
    raw.pointer("/suggest/phrase-suggest/0/options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|option| {
                    let term = option.get("text")?.as_str()?.to_string();
                    let estimated_count = option.get("freq").and_then(Value::as_u64);
                    Some(Suggestion {
                        term,
                        estimated_count,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_aggregation_suggestions(raw: &Value, query_text: &str) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if let Some(buckets) = raw.pointer("/aggregations/brands/buckets").and_then(Value::as_array) {
        for bucket in buckets {
            let Some(brand) = bucket.get("key").and_then(Value::as_str) else {
                continue;
            };
            let count = bucket.get("doc_count").and_then(Value::as_u64);
            suggestions.push(Suggestion {
                term: union_query_tokens(query_text, brand),
                estimated_count: count,
            });
        }
    }

    if let Some(buckets) = raw
        .pointer("/aggregations/categories/buckets")
        .and_then(Value::as_array)
    {
        for bucket in buckets {
            let Some(category) = bucket.get("key").and_then(Value::as_str) else {
                continue;
            };
            let count = bucket.get("doc_count").and_then(Value::as_u64);
            suggestions.push(Suggestion {
                term: category.to_string(),
                estimated_count: count,
            });
        }
    }

    suggestions
}

/// Brand suggestions are formed by union-merging the brand token into the
/// original query's token set (spec §4.7), not replacing it.
fn union_query_tokens(query_text: &str, brand: &str) -> String {
    let mut tokens: Vec<&str> = query_text.split_whitespace().collect();
    if !tokens.iter().any(|t| t.eq_ignore_ascii_case(brand)) {
        tokens.push(brand);
    }
    tokens.join(" ")
}

fn dedup_and_truncate(suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::new();
    for suggestion in suggestions {
        let key = suggestion.term.to_lowercase();
        if seen.insert(key) {
            deduped.push(suggestion);
        }
        if deduped.len() == MAX_SUGGESTIONS {
            break;
        }
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_query_tokens_appends_brand_once() {
        assert_eq!(union_query_tokens("running shoe", "Nike"), "running shoe Nike");
        assert_eq!(union_query_tokens("nike shoe", "Nike"), "nike shoe");
    }

    #[test]
    fn dedup_is_case_insensitive_and_truncates_to_five() {
        let suggestions = (0..10)
            .map(|i| Suggestion {
                term: if i % 2 == 0 { "Shirt".to_string() } else { "shirt".to_string() },
                estimated_count: None,
            })
            .collect();
        let result = dedup_and_truncate(suggestions);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn parse_phrase_suggestions_reads_options() {
        let raw = serde_json::json!({
            "suggest": {
                "phrase-suggest": [{
                    "options": [
                        {"text": "shirt", "freq": 12},
                        {"text": "shirts", "freq": 8}
                    ]
                }]
            }
        });
        let suggestions = parse_phrase_suggestions(&raw);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].term, "shirt");
        assert_eq!(suggestions[0].estimated_count, Some(12));
    }

    #[test]
    fn parse_aggregation_suggestions_reads_brand_and_category_buckets() {
        let raw = serde_json::json!({
            "aggregations": {
                "brands": {"buckets": [{"key": "Nike", "doc_count": 50}]},
                "categories": {"buckets": [{"key": "Shoes", "doc_count": 30}]}
            }
        });
        let suggestions = parse_aggregation_suggestions(&raw, "running");
        assert_eq!(suggestions[0].term, "running Nike");
        assert_eq!(suggestions[1].term, "Shoes");
    }
}
