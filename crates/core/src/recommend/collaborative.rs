//! User-based + item-based collaborative filtering.

use std::collections::HashMap;

use super::types::{Recommendation, RecommendationModel};
use crate::config::{RecommendConfig, SimilarityConfig};
use crate::domain::{CustomerId, ProductId};
use crate::state::TrainingSnapshot;

/// Blended collaborative scores for one customer.
///
/// Returns an empty list when the customer has no purchase history; the
/// engine treats that as cold start and falls back to popularity. Products
/// the customer already owns are never candidates. Each signal is
/// normalized to [0, 1] before blending so the fixed 0.6/0.4 weights
/// compare like with like; a candidate carried by a single signal keeps
/// only that signal's weight.
pub(super) fn collaborative_scores(
    snapshot: &TrainingSnapshot,
    customer: &CustomerId,
    config: &RecommendConfig,
    similarity_config: &SimilarityConfig,
) -> Vec<Recommendation> {
    let Some(owned) = snapshot.user_vectors.get(customer) else {
        return Vec::new();
    };
    if owned.is_empty() {
        return Vec::new();
    }

    // User-based: weighted sum over the top-K most similar users' baskets.
    let neighbors = snapshot.similarity.similar_users(customer, similarity_config.top_k_users);
    let mut user_signal: HashMap<ProductId, f64> = HashMap::new();
    for (neighbor, similarity) in &neighbors {
        if let Some(vector) = snapshot.user_vectors.get(neighbor) {
            for (product, rating) in vector {
                if owned.contains_key(product) {
                    continue;
                }
                *user_signal.entry(product.clone()).or_insert(0.0) += similarity * rating;
            }
        }
    }

    // Item-based: weighted sum over products similar to what the customer owns.
    let mut item_signal: HashMap<ProductId, f64> = HashMap::new();
    for (owned_product, rating) in owned {
        if let Some(similar) = snapshot.similarity.similar_products(owned_product) {
            for (candidate, similarity) in similar {
                if owned.contains_key(candidate) {
                    continue;
                }
                *item_signal.entry(candidate.clone()).or_insert(0.0) += similarity * rating;
            }
        }
    }

    normalize(&mut user_signal);
    normalize(&mut item_signal);

    let mut candidates: Vec<&ProductId> = user_signal.keys().chain(item_signal.keys()).collect();
    candidates.sort();
    candidates.dedup();

    let mut recommendations: Vec<Recommendation> = candidates
        .into_iter()
        .map(|product| {
            let user_score = user_signal.get(product).copied();
            let item_score = item_signal.get(product).copied();

            let (score, mut reasoning) = match (user_score, item_score) {
                (Some(user), Some(item)) => (
                    user * config.user_based_weight + item * config.item_based_weight,
                    vec!["Customers like you bought this".to_string()],
                ),
                (Some(user), None) => (
                    user * config.user_based_weight,
                    vec!["Customers like you bought this".to_string()],
                ),
                (None, Some(item)) => (
                    item * config.item_based_weight,
                    Vec::new(),
                ),
                (None, None) => (0.0, Vec::new()),
            };
            if item_score.is_some() {
                reasoning.push("Similar to products you own".to_string());
            }

            Recommendation {
                product_id: product.clone(),
                score,
                confidence: 0.0,
                reasoning,
                model: RecommendationModel::Collaborative,
            }
        })
        .filter(|rec| rec.score > 0.0)
        .collect();

    recommendations.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    let max_score = recommendations.first().map(|rec| rec.score).unwrap_or(0.0);
    if max_score > 0.0 {
        for rec in &mut recommendations {
            rec.confidence = (rec.score / max_score).clamp(0.0, 1.0);
        }
    }

    recommendations
}

fn normalize(signal: &mut HashMap<ProductId, f64>) {
    let max = signal.values().cloned().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for value in signal.values_mut() {
            *value /= max;
        }
    }
}
