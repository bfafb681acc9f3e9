//! Pairwise co-occurrence counting and Apriori-style association rules.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;

use super::{AssociationRule, ProductStats};
use crate::domain::{Order, ProductId};

/// Directional co-occurrence counts: for every pair of distinct products in
/// the same order, both A->B and B->A are incremented, since support and
/// confidence are asymmetric downstream.
pub(super) fn build_co_occurrence_matrix(
    orders: &[Order],
) -> HashMap<ProductId, HashMap<ProductId, u64>> {
    let mut matrix: HashMap<ProductId, HashMap<ProductId, u64>> = HashMap::new();

    for order in orders {
        let products = order.product_ids();
        for (i, a) in products.iter().enumerate() {
            for b in products.iter().skip(i + 1) {
                *matrix.entry(a.clone()).or_default().entry(b.clone()).or_insert(0) += 1;
                *matrix.entry(b.clone()).or_default().entry(a.clone()).or_insert(0) += 1;
            }
        }
    }

    matrix
}

pub(super) fn calculate_product_stats(orders: &[Order]) -> HashMap<ProductId, ProductStats> {
    let mut stats: HashMap<ProductId, ProductStats> = HashMap::new();
    if orders.is_empty() {
        return stats;
    }

    let mut basket_sizes: HashMap<ProductId, Vec<usize>> = HashMap::new();

    for order in orders {
        let products = order.product_ids();
        let basket_size = products.len();

        for product in &products {
            let entry = stats.entry(product.clone()).or_default();
            entry.total_orders += 1;
            basket_sizes.entry(product.clone()).or_default().push(basket_size);
        }

        for line in &order.lines {
            let entry = stats.entry(line.product_id.clone()).or_default();
            entry.revenue += line.unit_price * Decimal::from(line.quantity);
        }
    }

    let total_orders = orders.len() as f64;
    for (product, entry) in stats.iter_mut() {
        entry.support = entry.total_orders as f64 / total_orders;
        if let Some(sizes) = basket_sizes.get(product) {
            entry.avg_basket_size =
                sizes.iter().sum::<usize>() as f64 / sizes.len() as f64;
        }
    }

    stats
}

/// Pairwise rule generation. For each co-occurrence count `c` of (A, B):
/// support = c/total, confidence = c/orders(A), lift = confidence/support(B).
/// Rules failing min_support, min_confidence, or `lift <= 1.0` are dropped.
/// Output is sorted by descending lift with a deterministic id tie-break.
pub(super) fn generate_association_rules(
    co_occurrence: &HashMap<ProductId, HashMap<ProductId, u64>>,
    stats: &HashMap<ProductId, ProductStats>,
    total_orders: u64,
    min_support: f64,
    min_confidence: f64,
) -> Vec<AssociationRule> {
    if total_orders == 0 {
        return Vec::new();
    }

    let computed_at = Utc::now();
    let mut rules = Vec::new();

    for (antecedent, consequents) in co_occurrence {
        let Some(antecedent_stats) = stats.get(antecedent) else {
            continue;
        };
        if antecedent_stats.total_orders == 0 {
            continue;
        }

        for (consequent, count) in consequents {
            let support = *count as f64 / total_orders as f64;
            if support < min_support {
                continue;
            }

            let confidence = *count as f64 / antecedent_stats.total_orders as f64;
            if confidence < min_confidence {
                continue;
            }

            let Some(consequent_stats) = stats.get(consequent) else {
                continue;
            };
            if consequent_stats.support == 0.0 {
                continue;
            }

            let lift = confidence / consequent_stats.support;
            if lift <= 1.0 {
                continue;
            }

            rules.push(AssociationRule {
                antecedent: antecedent.clone(),
                consequent: consequent.clone(),
                support,
                confidence,
                lift,
                co_occurrences: *count,
                computed_at,
            });
        }
    }

    rules.sort_by(|a, b| {
        b.lift
            .partial_cmp(&a.lift)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.antecedent.cmp(&b.antecedent))
            .then_with(|| a.consequent.cmp(&b.consequent))
    });

    rules
}
