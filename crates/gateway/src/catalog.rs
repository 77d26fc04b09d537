//! Catalog Enricher (spec §4.4): batched relational lookup of variant
//! options for the set of productIds appearing on a page of hits.

use std::collections::HashMap;

use catalog_gateway_core::{ProductId, VariantId};
use serde::Serialize;
use sqlx::PgPool;

use crate::circuit::{CircuitBreaker, CircuitCallError};
use crate::config::CircuitConfig;
use crate::deadline::Deadline;

/// One variant of a product, projected down to the fields a product card
/// needs to render its option pickers (spec §4.4).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantOption {
    #[serde(rename = "variantId")]
    pub variant_id: VariantId,
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    pub attributes: serde_json::Value,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

/// Batched lookup of variant options, guarded by its own circuit breaker
/// (`catalog-variants`). Falls back to an empty map on any failure —
/// callers degrade to the variant options observed in the engine hits
/// rather than fail the request (spec §4.4, §5).
pub struct CatalogEnricher {
    pool: PgPool,
    breaker: CircuitBreaker,
}

impl CatalogEnricher {
    #[must_use]
    pub fn new(pool: PgPool, circuit: CircuitConfig) -> Self {
        Self {
            pool,
            breaker: CircuitBreaker::new("catalog-variants", circuit),
        }
    }

    /// Look up every variant belonging to `product_ids`, grouped by
    /// product. Never returns an error: a circuit-open or query failure
    /// both degrade to an empty map.
    pub async fn variant_options(
        &self,
        product_ids: &[ProductId],
        deadline: &Deadline,
        timeout: std::time::Duration,
    ) -> HashMap<ProductId, Vec<VariantOption>> {
        if product_ids.is_empty() {
            return HashMap::new();
        }

        let ids: Vec<i64> = product_ids.iter().map(|id| id.as_i64()).collect();
        let query = deadline.race(timeout, self.fetch(&ids));

        match query.await {
            Ok(Ok(rows)) => group_by_product(rows),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "catalog lookup failed, degrading to empty variant-options map");
                HashMap::new()
            }
            Err(_) => {
                tracing::warn!("catalog lookup exceeded its deadline, degrading to empty variant-options map");
                HashMap::new()
            }
        }
    }

    async fn fetch(&self, ids: &[i64]) -> Result<Vec<VariantRow>, CircuitCallError<sqlx::Error>> {
        self.breaker
            .call(async {
                sqlx::query_as::<_, VariantRow>(
                    r"
                    SELECT variant_id, product_id, attributes, image_url
                    FROM variants
                    WHERE product_id = ANY($1)
                    ",
                )
                .bind(ids)
                .fetch_all(&self.pool)
                .await
            })
            .await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    variant_id: i64,
    product_id: i64,
    attributes: serde_json::Value,
    image_url: Option<String>,
}

fn group_by_product(rows: Vec<VariantRow>) -> HashMap<ProductId, Vec<VariantOption>> {
    let mut map: HashMap<ProductId, Vec<VariantOption>> = HashMap::new();
    for row in rows {
        let product_id = ProductId::from(row.product_id);
        map.entry(product_id).or_default().push(VariantOption {
            variant_id: VariantId::from(row.variant_id),
            product_id,
            attributes: row.attributes,
            image_url: row.image_url,
        });
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_rows_by_product_id() {
        let rows = vec![
            VariantRow {
                variant_id: 1,
                product_id: 10,
                attributes: serde_json::json!({"color": "Red"}),
                image_url: None,
            },
            VariantRow {
                variant_id: 2,
                product_id: 10,
                attributes: serde_json::json!({"color": "Blue"}),
                image_url: None,
            },
            VariantRow {
                variant_id: 3,
                product_id: 20,
                attributes: serde_json::json!({"color": "Green"}),
                image_url: None,
            },
        ];

        let grouped = group_by_product(rows);
        assert_eq!(grouped.get(&ProductId::from(10)).unwrap().len(), 2);
        assert_eq!(grouped.get(&ProductId::from(20)).unwrap().len(), 1);
    }
}
