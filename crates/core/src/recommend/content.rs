//! Content-based filtering over product feature vectors.

use std::collections::{HashMap, HashSet};

use super::types::{Recommendation, RecommendationModel};
use crate::config::RecommendConfig;
use crate::domain::{CustomerId, ProductId};
use crate::similarity::cosine_similarity;
use crate::state::TrainingSnapshot;

/// Scores candidates by weighted-average feature similarity to a reference
/// set: the customer's purchase history (weight 1.0) plus any in-context
/// products (weight 1.5). The result is multiplied by `1 + preference_boost`
/// where the boost is the candidate's alignment with a normalized aggregate
/// of the customer's historical feature weights, capped at 50%.
pub(super) fn content_based_scores(
    snapshot: &TrainingSnapshot,
    customer: Option<&CustomerId>,
    context_products: &[ProductId],
    config: &RecommendConfig,
) -> Vec<Recommendation> {
    let history: Vec<ProductId> = customer
        .and_then(|id| snapshot.user_vectors.get(id))
        .map(|vector| vector.keys().cloned().collect())
        .unwrap_or_default();

    // Context products outrank history when a product appears in both.
    let mut references: HashMap<ProductId, f64> = HashMap::new();
    for product in &history {
        references.insert(product.clone(), 1.0);
    }
    for product in context_products {
        references.insert(product.clone(), config.context_product_weight);
    }
    references.retain(|product, _| snapshot.feature_vectors.contains_key(product));

    if references.is_empty() {
        return Vec::new();
    }

    let preference = historical_preference(snapshot, &history);
    let reference_ids: HashSet<&ProductId> = references.keys().collect();

    let mut recommendations: Vec<Recommendation> = snapshot
        .feature_vectors
        .iter()
        .filter(|(candidate, _)| !reference_ids.contains(candidate))
        .filter_map(|(candidate, features)| {
            let total_weight: f64 = references.values().sum();
            let weighted_similarity: f64 = references
                .iter()
                .map(|(reference, weight)| {
                    let reference_features = &snapshot.feature_vectors[reference];
                    weight * cosine_similarity(features, reference_features)
                })
                .sum();

            let base = weighted_similarity / total_weight;
            if base <= 0.0 {
                return None;
            }

            let boost = preference
                .as_ref()
                .map(|aggregate| {
                    cosine_similarity(features, aggregate).min(config.max_preference_boost)
                })
                .unwrap_or(0.0);

            let mut reasoning = vec!["Matches products you've shown interest in".to_string()];
            if boost > 0.0 {
                reasoning.push("Aligned with your favorite styles".to_string());
            }

            Some(Recommendation {
                product_id: candidate.clone(),
                score: base * (1.0 + boost),
                confidence: 0.0,
                reasoning,
                model: RecommendationModel::ContentBased,
            })
        })
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

/// Aggregate of the customer's historical feature weights, for the
/// preference boost. Cosine against this is already scale-free, so plain
/// summation is enough.
fn historical_preference(
    snapshot: &TrainingSnapshot,
    history: &[ProductId],
) -> Option<HashMap<String, f64>> {
    let mut aggregate: HashMap<String, f64> = HashMap::new();
    for product in history {
        if let Some(features) = snapshot.feature_vectors.get(product) {
            for (key, weight) in features {
                *aggregate.entry(key.clone()).or_insert(0.0) += weight;
            }
        }
    }

    (!aggregate.is_empty()).then_some(aggregate)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::content_based_scores;
    use crate::config::EngineConfig;
    use crate::domain::{CustomerId, ProductId};
    use crate::state::TrainingSnapshot;

    fn features(entries: &[&str]) -> HashMap<String, f64> {
        entries.iter().map(|key| (key.to_string(), 1.0)).collect()
    }

    fn snapshot() -> TrainingSnapshot {
        let mut snapshot = TrainingSnapshot::default();
        snapshot
            .feature_vectors
            .insert(ProductId::new("owned"), features(&["category:shoes", "brand:apex"]));
        snapshot
            .feature_vectors
            .insert(ProductId::new("similar"), features(&["category:shoes", "brand:apex"]));
        snapshot
            .feature_vectors
            .insert(ProductId::new("adjacent"), features(&["category:shoes", "brand:verdant"]));
        snapshot
            .feature_vectors
            .insert(ProductId::new("unrelated"), features(&["category:garden", "brand:verdant"]));
        snapshot
            .user_vectors
            .insert(CustomerId::new("c1"), [(ProductId::new("owned"), 1.0)].into_iter().collect());
        snapshot
    }

    #[test]
    fn similar_products_outrank_partial_matches() {
        let config = EngineConfig::default().recommend;
        let recs = content_based_scores(&snapshot(), Some(&CustomerId::new("c1")), &[], &config);

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].product_id, ProductId::new("similar"));
        assert_eq!(recs[1].product_id, ProductId::new("adjacent"));
        assert!(recs[0].score > recs[1].score);
        // Reference products are never candidates, and candidates with no
        // feature overlap are dropped rather than scored at zero.
        assert!(recs.iter().all(|rec| rec.product_id != ProductId::new("owned")));
        assert!(recs.iter().all(|rec| rec.product_id != ProductId::new("unrelated")));
    }

    #[test]
    fn context_products_work_without_history() {
        let config = EngineConfig::default().recommend;
        let recs = content_based_scores(
            &snapshot(),
            None,
            std::slice::from_ref(&ProductId::new("owned")),
            &config,
        );

        assert!(!recs.is_empty());
        assert_eq!(recs[0].product_id, ProductId::new("similar"));
    }

    #[test]
    fn no_references_yields_empty_result() {
        let config = EngineConfig::default().recommend;
        let recs = content_based_scores(&snapshot(), None, &[], &config);
        assert!(recs.is_empty());
    }

    #[test]
    fn preference_boost_never_exceeds_cap() {
        let config = EngineConfig::default().recommend;
        let recs = content_based_scores(&snapshot(), Some(&CustomerId::new("c1")), &[], &config);

        // With identical features the uncapped boost would be 1.0; the
        // capped score is base * 1.5 at most.
        for rec in recs {
            assert!(rec.score <= 1.0 * (1.0 + config.max_preference_boost) + 1e-9);
        }
    }
}
