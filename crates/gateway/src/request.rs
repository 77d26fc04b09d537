//! Request Normalizer (spec §4.1): raw HTTP input → canonical query record
//! + cache key.
//!
//! Validation happens here and only here — a `SearchQuery`/`FacetQuery`
//! that made it past [`SearchQuery::normalize`] never triggers a
//! `BadRequest` further down the pipeline.

use std::collections::BTreeMap;
use std::fmt;

use catalog_gateway_core::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

/// The header clients use to supply (and the gateway always echoes) a
/// correlation id (spec §6).
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Per-request correlation id, generated if the client didn't supply one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Self(v.to_string()),
            _ => Self(Uuid::new_v4().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single- or multi-valued attribute filter (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    Multi(Vec<String>),
}

impl FilterValue {
    /// Canonicalize: lower-case values and, for multi-valued filters, sort
    /// the value set (spec §4.1).
    fn canonicalize(self) -> Self {
        match self {
            Self::Single(v) => Self::Single(v.to_lowercase()),
            Self::Multi(mut values) => {
                for v in &mut values {
                    *v = v.to_lowercase();
                }
                values.sort();
                values.dedup();
                Self::Multi(values)
            }
        }
    }
}

/// Non-negative inclusive price bounds. `min > max` is accepted (spec §8:
/// "implementation-defined, recommended: no match") and simply produces a
/// range clause that matches nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: Option<Price>,
    pub max: Option<Price>,
}

/// Raw, unvalidated query parameters as they arrive over HTTP.
#[derive(Debug, Deserialize)]
pub struct RawSearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(rename = "categoryId", default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(rename = "priceRange[min]", default)]
    pub price_min: Option<Decimal>,
    #[serde(rename = "priceRange[max]", default)]
    pub price_max: Option<Decimal>,
    #[serde(default)]
    pub filters: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Raw facet query parameters: everything `RawSearchParams` has, plus
/// `facetKeys`.
#[derive(Debug, Deserialize)]
pub struct RawFacetParams {
    #[serde(flatten)]
    pub search: RawSearchParams,
    #[serde(rename = "facetKeys", default)]
    pub facet_keys: String,
}

/// Canonical query record shared by the search and facet pipelines (spec
/// §4.1, §4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalQuery {
    pub text: String,
    pub category_id: Option<String>,
    pub brand: Option<String>,
    pub price_range: Option<PriceRange>,
    pub attribute_filters: BTreeMap<String, FilterValue>,
    pub limit: u32,
    pub cursor: Option<String>,
}

const MIN_TEXT_LEN: usize = 1;
const MAX_TEXT_LEN: usize = 200;
const MIN_LIMIT: u32 = 1;
const MAX_LIMIT: u32 = 100;
const DEFAULT_LIMIT: u32 = 20;

impl CanonicalQuery {
    /// Validate and canonicalize raw search parameters (spec §4.1, §8).
    pub fn normalize(raw: RawSearchParams) -> Result<Self, AppError> {
        let text = raw.q.trim().to_string();
        if text.chars().count() < MIN_TEXT_LEN || text.chars().count() > MAX_TEXT_LEN {
            return Err(AppError::BadRequest(format!(
                "q must be between {MIN_TEXT_LEN} and {MAX_TEXT_LEN} characters"
            )));
        }

        let limit = raw.limit.unwrap_or(DEFAULT_LIMIT);
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between {MIN_LIMIT} and {MAX_LIMIT}"
            )));
        }

        let price_range = parse_price_range(raw.price_min, raw.price_max)?;
        let attribute_filters = parse_filters(raw.filters.as_deref())?;

        Ok(Self {
            text,
            category_id: raw.category_id.map(|v| v.trim().to_lowercase()),
            brand: raw.brand.map(|v| v.trim().to_lowercase()),
            price_range,
            attribute_filters,
            limit,
            cursor: raw.cursor.filter(|c| !c.is_empty()),
        })
    }

    /// The cache key for this query: `<prefix>:<sorted k=json(v)|...>`
    /// (spec §4.1). Distinct attribute-filter key order or value-set order
    /// never changes the key.
    #[must_use]
    pub fn cache_key(&self, prefix: &str) -> String {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        fields.insert("q".to_string(), json_string(&self.text));
        if let Some(category_id) = &self.category_id {
            fields.insert("categoryId".to_string(), json_string(category_id));
        }
        if let Some(brand) = &self.brand {
            fields.insert("brand".to_string(), json_string(brand));
        }
        if let Some(range) = &self.price_range {
            fields.insert(
                "priceRange".to_string(),
                serde_json::json!({
                    "min": range.min.map(|p| p.as_f64()),
                    "max": range.max.map(|p| p.as_f64()),
                })
                .to_string(),
            );
        }
        for (key, value) in &self.attribute_filters {
            fields.insert(
                format!("filters.{key}"),
                serde_json::to_string(value).unwrap_or_default(),
            );
        }
        fields.insert("limit".to_string(), self.limit.to_string());
        if let Some(cursor) = &self.cursor {
            fields.insert("cursor".to_string(), json_string(cursor));
        }

        let joined = fields
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("|");
        format!("{prefix}:{joined}")
    }
}

/// Allow-listed facet keys (spec §4.1, §9 "Facet allow-list").
fn is_allowed_facet_key(key: &str) -> bool {
    matches!(key, "brand" | "categoryId" | "categoryName" | "priceFrom") || key.starts_with("attributes.")
}

/// Facet query: the search filters plus the set of requested facet keys.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetQuery {
    pub search: CanonicalQuery,
    pub facet_keys: Vec<String>,
}

impl FacetQuery {
    pub fn normalize(raw: RawFacetParams) -> Result<Self, AppError> {
        let search = CanonicalQuery::normalize(raw.search)?;

        let requested: Vec<String> = raw
            .facet_keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        if requested.is_empty() {
            return Err(AppError::BadRequest(
                "facetKeys must contain at least one key".to_string(),
            ));
        }

        let mut facet_keys = Vec::new();
        for key in requested {
            if is_allowed_facet_key(&key) {
                facet_keys.push(key);
            } else {
                tracing::warn!(facet_key = %key, "dropping facet key not on the allow-list");
            }
        }

        Ok(Self { search, facet_keys })
    }

    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut key = self.search.cache_key("facets");
        key.push_str("|facetKeys=");
        key.push_str(&self.facet_keys.join(","));
        key
    }
}

fn parse_price_range(
    min: Option<Decimal>,
    max: Option<Decimal>,
) -> Result<Option<PriceRange>, AppError> {
    if min.is_none() && max.is_none() {
        return Ok(None);
    }
    let min = min
        .map(Price::new)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let max = max
        .map(Price::new)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Some(PriceRange { min, max }))
}

fn parse_filters(raw: Option<&str>) -> Result<BTreeMap<String, FilterValue>, AppError> {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return Ok(BTreeMap::new());
    };
    let parsed: BTreeMap<String, FilterValue> = serde_json::from_str(raw)
        .map_err(|e| AppError::BadRequest(format!("invalid filters: {e}")))?;
    Ok(parsed
        .into_iter()
        .map(|(k, v)| (k, v.canonicalize()))
        .collect())
}

fn json_string(s: &str) -> String {
    Value::from(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(q: &str) -> RawSearchParams {
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

    #[test]
    fn rejects_empty_text() {
        assert!(CanonicalQuery::normalize(raw("")).is_err());
    }

    #[test]
    fn rejects_text_over_200_chars() {
        let long = "a".repeat(201);
        assert!(CanonicalQuery::normalize(raw(&long)).is_err());
    }

    #[test]
    fn accepts_200_char_text() {
        let text = "a".repeat(200);
        assert!(CanonicalQuery::normalize(raw(&text)).is_ok());
    }

    #[test]
    fn defaults_limit_to_20() {
        let query = CanonicalQuery::normalize(raw("shirt")).unwrap();
        assert_eq!(query.limit, 20);
    }

    #[test]
    fn rejects_limit_over_100() {
        let mut params = raw("shirt");
        params.limit = Some(101);
        assert!(CanonicalQuery::normalize(params).is_err());
    }

    #[test]
    fn accepts_limit_of_100() {
        let mut params = raw("shirt");
        params.limit = Some(100);
        assert!(CanonicalQuery::normalize(params).is_ok());
    }

    #[test]
    fn rejects_limit_of_zero() {
        let mut params = raw("shirt");
        params.limit = Some(0);
        assert!(CanonicalQuery::normalize(params).is_err());
    }

    #[test]
    fn min_greater_than_max_is_accepted_not_rejected() {
        let mut params = raw("shirt");
        params.price_min = Some(Decimal::new(10000, 2));
        params.price_max = Some(Decimal::new(100, 2));
        assert!(CanonicalQuery::normalize(params).is_ok());
    }

    #[test]
    fn cache_key_is_stable_across_attribute_key_order() {
        let mut params_a = raw("shirt");
        params_a.filters = Some(r#"{"color":"Red","size":"M"}"#.to_string());
        let mut params_b = raw("shirt");
        params_b.filters = Some(r#"{"size":"M","color":"Red"}"#.to_string());

        let a = CanonicalQuery::normalize(params_a).unwrap();
        let b = CanonicalQuery::normalize(params_b).unwrap();
        assert_eq!(a.cache_key("search"), b.cache_key("search"));
    }

    #[test]
    fn cache_key_is_stable_across_multi_value_order() {
        let mut params_a = raw("shirt");
        params_a.filters = Some(r#"{"color":["Red","Blue"]}"#.to_string());
        let mut params_b = raw("shirt");
        params_b.filters = Some(r#"{"color":["Blue","Red"]}"#.to_string());

        let a = CanonicalQuery::normalize(params_a).unwrap();
        let b = CanonicalQuery::normalize(params_b).unwrap();
        assert_eq!(a.cache_key("search"), b.cache_key("search"));
    }

    #[test]
    fn invalid_facet_keys_are_dropped_silently() {
        let raw = RawFacetParams {
            search: raw("shirt"),
            facet_keys: "brand,nonsense,priceFrom".to_string(),
        };
        let facet_query = FacetQuery::normalize(raw).unwrap();
        assert_eq!(facet_query.facet_keys, vec!["brand", "priceFrom"]);
    }

    #[test]
    fn attribute_prefixed_facet_keys_are_allowed() {
        assert!(is_allowed_facet_key("attributes.color"));
        assert!(!is_allowed_facet_key("password"));
    }

    #[test]
    fn correlation_id_falls_back_to_generated_uuid() {
        let id = CorrelationId::from_header(None);
        assert_eq!(id.as_str().len(), 36);
    }

    #[test]
    fn correlation_id_echoes_supplied_header() {
        let id = CorrelationId::from_header(Some("abc-123"));
        assert_eq!(id.as_str(), "abc-123");
    }
}
