//! Market-basket affinity mining.
//!
//! Builds co-occurrence counts, association rules (support/confidence/lift),
//! cross-order sequential purchase patterns, category-level PMI, and frequent
//! product bundles from order history. Mining is a batch job; the resulting
//! [`AffinityModel`] is immutable and swapped into engine state wholesale.

mod bundles;
mod category;
mod rules;
mod sequential;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AffinityConfig;
use crate::domain::{Order, Product, ProductId};

/// Per-product aggregates over the mined order set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    /// Number of orders containing this product.
    pub total_orders: u64,
    /// Fraction of all orders containing this product.
    pub support: f64,
    pub revenue: Decimal,
    /// Mean distinct-product count of the orders containing this product.
    pub avg_basket_size: f64,
}

/// Directional association rule A -> B. Only rules with `lift > 1.0`
/// (positive correlation) are retained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: ProductId,
    pub consequent: ProductId,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub co_occurrences: u64,
    pub computed_at: DateTime<Utc>,
}

/// Cross-order purchase sequence A -> B with elapsed-days aggregates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequentialPattern {
    pub count: u64,
    pub avg_days: f64,
    pub median_days: f64,
    /// Individual elapsed-day observations backing the aggregates.
    pub occurrences: Vec<f64>,
}

/// Ranked follow-up purchase candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextPurchasePrediction {
    pub product_id: ProductId,
    pub count: u64,
    pub avg_days: f64,
    pub median_days: f64,
}

/// Category pair association measured by pointwise mutual information.
/// PMI may be negative (anti-correlated categories); recommendation callers
/// filter for positive values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryAffinity {
    pub category_a: String,
    pub category_b: String,
    pub pmi: f64,
    pub co_occurrences: u64,
    pub support: f64,
}

/// Frequent itemset discovered by level-wise extension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductBundle {
    pub products: Vec<ProductId>,
    pub support: f64,
}

impl ProductBundle {
    pub fn size(&self) -> usize {
        self.products.len()
    }
}

/// Immutable output of one affinity mining pass.
#[derive(Clone, Debug, Default)]
pub struct AffinityModel {
    pub co_occurrence: HashMap<ProductId, HashMap<ProductId, u64>>,
    pub stats: HashMap<ProductId, ProductStats>,
    pub total_orders: u64,
    pub rules: Vec<AssociationRule>,
    pub sequential: HashMap<ProductId, HashMap<ProductId, SequentialPattern>>,
    pub category_affinity: Vec<CategoryAffinity>,
    pub bundles: Vec<ProductBundle>,
}

impl AffinityModel {
    /// Rules where `product_id` is the antecedent, strongest lift first.
    pub fn complementary_products(
        &self,
        product_id: &ProductId,
        max_results: usize,
    ) -> Vec<&AssociationRule> {
        // Rules are already sorted by descending lift.
        self.rules
            .iter()
            .filter(|rule| &rule.antecedent == product_id)
            .take(max_results)
            .collect()
    }

    /// Likely follow-up purchases after `product_id`, ranked by how often the
    /// sequence was observed (not recency-weighted).
    pub fn predict_next_purchase(
        &self,
        product_id: &ProductId,
        max_results: usize,
    ) -> Vec<NextPurchasePrediction> {
        let Some(followers) = self.sequential.get(product_id) else {
            return Vec::new();
        };

        let mut predictions: Vec<NextPurchasePrediction> = followers
            .iter()
            .map(|(to, pattern)| NextPurchasePrediction {
                product_id: to.clone(),
                count: pattern.count,
                avg_days: pattern.avg_days,
                median_days: pattern.median_days,
            })
            .collect();

        predictions.sort_by(|a, b| {
            b.count.cmp(&a.count).then_with(|| a.product_id.cmp(&b.product_id))
        });
        predictions.truncate(max_results);
        predictions
    }
}

/// Batch miner configured with support/confidence thresholds and bundle
/// bounds. Tolerates empty order sets by producing an empty model.
#[derive(Clone, Debug)]
pub struct AffinityAnalyzer {
    config: AffinityConfig,
}

impl AffinityAnalyzer {
    pub fn new(config: AffinityConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, orders: &[Order], catalog: &HashMap<ProductId, Product>) -> AffinityModel {
        self.analyze_with_thresholds(
            orders,
            catalog,
            self.config.min_support,
            self.config.min_confidence,
        )
    }

    /// Full mining pass with explicit thresholds (the
    /// `analyze_frequently_bought_together` training entry point).
    pub fn analyze_with_thresholds(
        &self,
        orders: &[Order],
        catalog: &HashMap<ProductId, Product>,
        min_support: f64,
        min_confidence: f64,
    ) -> AffinityModel {
        if orders.is_empty() {
            return AffinityModel::default();
        }

        let co_occurrence = rules::build_co_occurrence_matrix(orders);
        let stats = rules::calculate_product_stats(orders);
        let total_orders = orders.len() as u64;
        let generated_rules = rules::generate_association_rules(
            &co_occurrence,
            &stats,
            total_orders,
            min_support,
            min_confidence,
        );
        let sequential = sequential::analyze_sequential_patterns(orders);
        let category_affinity = category::analyze_category_affinity(orders, catalog);
        let bundles = bundles::find_product_bundles(
            orders,
            min_support,
            self.config.bundle_min_products,
            self.config.bundle_max_products,
        );

        info!(
            orders = orders.len(),
            rules = generated_rules.len(),
            bundles = bundles.len(),
            "affinity mining pass complete"
        );

        AffinityModel {
            co_occurrence,
            stats,
            total_orders,
            rules: generated_rules,
            sequential,
            category_affinity,
            bundles,
        }
    }
}
