//! Product Grouper (spec §4.5): variant hits → product-level results with
//! buy-box offer selection and cursor derivation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use catalog_gateway_core::{Price, ProductId, VariantId};
use serde::Serialize;

use crate::catalog::VariantOption;
use crate::cursor;
use crate::engine::{Offer, VariantHit};

/// The variant within a product group that matched best (spec §4.5 step 2).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedVariant {
    #[serde(rename = "variantId")]
    pub variant_id: VariantId,
    pub sku: String,
    #[serde(rename = "priceFrom")]
    pub price_from: Price,
    #[serde(rename = "totalStock")]
    pub total_stock: i64,
    pub attributes: BTreeMap<String, String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

/// A supplier summary as it appears inside a `bestOffer` (spec §4.5 step 3).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierSummary {
    #[serde(rename = "supplierId")]
    pub supplier_id: String,
    pub name: String,
    pub rating: f64,
}

/// The buy-box offer. `offer_id == ""` is the documented placeholder
/// emitted when a matched variant carries no offers at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyBoxOffer {
    #[serde(rename = "offerId")]
    pub offer_id: String,
    pub price: Price,
    pub stock: i64,
    pub supplier: SupplierSummary,
}

impl BuyBoxOffer {
    /// The observable fallback contract for a variant with zero offers
    /// (spec §4.5 step 3).
    fn placeholder(price_from: Price) -> Self {
        Self {
            offer_id: String::new(),
            price: price_from,
            stock: 0,
            supplier: SupplierSummary {
                supplier_id: String::new(),
                name: "Unknown".to_string(),
                rating: 0.0,
            },
        }
    }
}

/// One product-level search result (spec §3 `ProductResult`).
#[derive(Debug, Clone, Serialize)]
pub struct ProductResult {
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub brand: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    #[serde(rename = "categoryName")]
    pub category_name: String,
    #[serde(rename = "matchedVariant")]
    pub matched_variant: MatchedVariant,
    #[serde(rename = "bestOffer")]
    pub best_offer: BuyBoxOffer,
    #[serde(rename = "variantOptions")]
    pub variant_options: Vec<VariantOption>,
    #[serde(rename = "offerCount")]
    pub offer_count: usize,
    pub score: f64,
}

struct Group<'a> {
    hits: Vec<&'a VariantHit>,
}

/// Group variant hits into product-level results, select each group's
/// matched variant and buy-box offer, and attach enricher-supplied variant
/// options (falling back to the hits themselves when the enricher has
/// nothing for a product).
#[must_use]
pub fn group(
    hits: &[VariantHit],
    variant_options: &HashMap<ProductId, Vec<VariantOption>>,
) -> Vec<ProductResult> {
    let mut order: Vec<ProductId> = Vec::new();
    let mut groups: HashMap<ProductId, Group<'_>> = HashMap::new();

    for hit in hits {
        let product_id = hit.document.product_id;
        groups
            .entry(product_id)
            .or_insert_with(|| {
                order.push(product_id);
                Group { hits: Vec::new() }
            })
            .hits
            .push(hit);
    }

    let mut results: Vec<ProductResult> = order
        .into_iter()
        .map(|product_id| build_result(product_id, &groups[&product_id]))
        .collect();

    // Spec §4.5 step 6: sort by score desc, tie-break by productId for a
    // deterministic order (the spec leaves tie order unspecified but
    // suggests this).
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    results
}

fn build_result(product_id: ProductId, group: &Group<'_>) -> ProductResult {
    let max_score = group
        .hits
        .iter()
        .map(|h| h.score)
        .fold(f64::MIN, f64::max);

    // Step 2: matched variant = highest score, tie-break by lower priceFrom.
    let matched_hit = group
        .hits
        .iter()
        .min_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.document.price_from.cmp(&b.document.price_from))
        })
        .expect("a product group always has at least one hit");

    let matched_variant = MatchedVariant {
        variant_id: matched_hit.document.variant_id,
        sku: matched_hit.document.sku.clone(),
        price_from: matched_hit.document.price_from,
        total_stock: matched_hit.document.total_stock,
        attributes: matched_hit.document.attributes.clone(),
        image_url: matched_hit.document.image_url.clone(),
    };

    let best_offer = select_buy_box(&matched_hit.document.offers, matched_hit.document.price_from);

    let offer_count = group.hits.iter().map(|h| h.document.offers.len()).sum();

    ProductResult {
        product_id,
        name: matched_hit.document.product_name.clone(),
        description: matched_hit.document.product_description.clone(),
        brand: matched_hit.document.brand.clone(),
        category_id: matched_hit.document.category_id.clone(),
        category_name: matched_hit.document.category_name.clone(),
        matched_variant,
        best_offer,
        variant_options: Vec::new(),
        offer_count,
        score: max_score,
    }
}

/// Attach enricher-supplied variant options, falling back to the options
/// observed directly in the hits when the enricher has nothing for this
/// product (spec §4.4, §4.5 step 4).
pub fn attach_variant_options(
    mut results: Vec<ProductResult>,
    hits: &[VariantHit],
    enriched: &HashMap<ProductId, Vec<VariantOption>>,
) -> Vec<ProductResult> {
    for result in &mut results {
        result.variant_options = enriched.get(&result.product_id).cloned().unwrap_or_else(|| {
            hits.iter()
                .filter(|h| h.document.product_id == result.product_id)
                .map(|h| VariantOption {
                    variant_id: h.document.variant_id,
                    product_id: h.document.product_id,
                    attributes: serde_json::to_value(&h.document.attributes).unwrap_or_default(),
                    image_url: h.document.image_url.clone(),
                })
                .collect()
        });
    }
    results
}

/// Select the buy-box offer (spec §4.5 step 3): lowest price among
/// in-stock offers, else lowest price among any offers, else the
/// zero-offer placeholder.
fn select_buy_box(offers: &[Offer], price_from: Price) -> BuyBoxOffer {
    let in_stock = offers
        .iter()
        .filter(|o| o.stock > 0)
        .min_by(|a, b| a.price.cmp(&b.price));

    let chosen = in_stock.or_else(|| offers.iter().min_by(|a, b| a.price.cmp(&b.price)));

    match chosen {
        Some(offer) => BuyBoxOffer {
            offer_id: offer.offer_id.to_string(),
            price: offer.price,
            stock: offer.stock,
            supplier: SupplierSummary {
                supplier_id: offer.supplier_id.to_string(),
                name: offer.supplier_name.clone(),
                rating: offer.supplier_rating,
            },
        },
        None => BuyBoxOffer::placeholder(price_from),
    }
}

/// `nextCursor` is derived from the last hit of the *engine* response, not
/// the last `ProductResult`, and is only emitted when the page was full
/// and the last hit carries sort values (spec §4.2, §4.5).
#[must_use]
pub fn next_cursor(hits: &[VariantHit], limit: u32) -> Option<String> {
    if hits.len() < limit as usize {
        return None;
    }
    let last = hits.last()?;
    if last.sort.is_empty() {
        return None;
    }
    Some(cursor::encode(&last.sort))
}
