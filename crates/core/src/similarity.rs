//! Sparse-vector similarity math and the product/user similarity index.
//!
//! Cosine similarity treats missing keys as zero; Pearson correlation is
//! restricted to keys present in both series. Degenerate inputs (zero
//! magnitude, fewer than two common observations, zero variance) yield 0.0
//! rather than NaN so callers never have to special-case them.

use std::collections::HashMap;
use std::hash::Hash;

use crate::config::SimilarityConfig;
use crate::domain::{CustomerId, ProductId};

/// Cosine similarity between two sparse vectors. Returns a value in [0, 1]
/// for non-negative weights; 0.0 when either vector has zero magnitude.
pub fn cosine_similarity<K: Eq + Hash>(a: &HashMap<K, f64>, b: &HashMap<K, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Iterate the smaller map for the dot product.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(key, weight)| large.get(key).map(|other| weight * other))
        .sum();

    let magnitude_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let magnitude_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot / (magnitude_a * magnitude_b)).clamp(0.0, 1.0)
}

/// Pearson correlation over the keys present in both maps.
///
/// Requires at least two common observations; returns 0.0 otherwise and when
/// either restricted series has zero variance.
pub fn pearson_correlation<K: Eq + Hash>(a: &HashMap<K, f64>, b: &HashMap<K, f64>) -> f64 {
    let paired: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(key, x)| b.get(key).map(|y| (*x, *y)))
        .collect();

    if paired.len() < 2 {
        return 0.0;
    }

    let n = paired.len() as f64;
    let mean_x = paired.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = paired.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in &paired {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return 0.0;
    }

    (covariance / (variance_x.sqrt() * variance_y.sqrt())).clamp(-1.0, 1.0)
}

/// Precomputed product-product and user-user similarity tables.
///
/// Item-item scores use Pearson correlation over co-rating users and are
/// stored per direction; user-user scores use cosine similarity and are
/// symmetric. The index is rebuilt wholesale by training and swapped in
/// atomically, never mutated in place.
#[derive(Clone, Debug, Default)]
pub struct SimilarityIndex {
    products: HashMap<ProductId, HashMap<ProductId, f64>>,
    users: HashMap<CustomerId, HashMap<CustomerId, f64>>,
}

impl SimilarityIndex {
    /// Full O(n^2 * m) batch rebuild from user rating vectors.
    pub fn compute(
        user_vectors: &HashMap<CustomerId, HashMap<ProductId, f64>>,
        config: &SimilarityConfig,
    ) -> Self {
        let mut index = Self::default();

        // Transpose into product -> (user -> rating) series for Pearson.
        let mut product_ratings: HashMap<ProductId, HashMap<CustomerId, f64>> = HashMap::new();
        for (user, vector) in user_vectors {
            for (product, rating) in vector {
                product_ratings
                    .entry(product.clone())
                    .or_default()
                    .insert(user.clone(), *rating);
            }
        }

        let mut product_ids: Vec<&ProductId> = product_ratings.keys().collect();
        product_ids.sort();

        for (i, a) in product_ids.iter().enumerate() {
            for b in product_ids.iter().skip(i + 1) {
                let series_a = &product_ratings[*a];
                let series_b = &product_ratings[*b];

                let common = series_a.keys().filter(|user| series_b.contains_key(*user)).count();
                if common < config.min_common_raters {
                    continue;
                }

                let score = pearson_correlation(series_a, series_b);
                if score > config.min_similarity {
                    index.products.entry((*a).clone()).or_default().insert((*b).clone(), score);
                    index.products.entry((*b).clone()).or_default().insert((*a).clone(), score);
                }
            }
        }

        let mut user_ids: Vec<&CustomerId> = user_vectors.keys().collect();
        user_ids.sort();

        for (i, a) in user_ids.iter().enumerate() {
            for b in user_ids.iter().skip(i + 1) {
                let score = cosine_similarity(&user_vectors[*a], &user_vectors[*b]);
                if score > 0.0 {
                    index.users.entry((*a).clone()).or_default().insert((*b).clone(), score);
                    index.users.entry((*b).clone()).or_default().insert((*a).clone(), score);
                }
            }
        }

        index
    }

    pub fn similar_products(&self, product_id: &ProductId) -> Option<&HashMap<ProductId, f64>> {
        self.products.get(product_id)
    }

    /// Top-k most similar users, sorted by descending similarity with a
    /// deterministic id tie-break.
    pub fn similar_users(&self, user_id: &CustomerId, k: usize) -> Vec<(CustomerId, f64)> {
        let Some(neighbors) = self.users.get(user_id) else {
            return Vec::new();
        };

        let mut ranked: Vec<(CustomerId, f64)> =
            neighbors.iter().map(|(id, score)| (id.clone(), *score)).collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{cosine_similarity, pearson_correlation, SimilarityIndex};
    use crate::config::SimilarityConfig;
    use crate::domain::{CustomerId, ProductId};

    fn vector(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(key, value)| (key.to_string(), *value)).collect()
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vector(&[("x", 1.0), ("y", 2.0), ("z", 0.5)]);
        let b = vector(&[("y", 1.0), ("z", 3.0), ("w", 4.0)]);

        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let a = vector(&[("x", 2.0), ("y", 3.0)]);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_handles_zero_magnitude_without_nan() {
        let a = vector(&[("x", 0.0)]);
        let b = vector(&[("x", 1.0)]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&HashMap::new(), &b), 0.0);
    }

    #[test]
    fn pearson_of_series_with_itself_is_one() {
        let a = vector(&[("u1", 1.0), ("u2", 3.0), ("u3", 5.0)]);
        assert!((pearson_correlation(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_requires_two_common_observations() {
        let a = vector(&[("u1", 1.0), ("u2", 3.0)]);
        let b = vector(&[("u2", 4.0), ("u3", 5.0)]);
        // Only u2 is shared.
        assert_eq!(pearson_correlation(&a, &b), 0.0);
    }

    #[test]
    fn pearson_detects_negative_correlation() {
        let a = vector(&[("u1", 1.0), ("u2", 2.0), ("u3", 3.0)]);
        let b = vector(&[("u1", 3.0), ("u2", 2.0), ("u3", 1.0)]);
        assert!((pearson_correlation(&a, &b) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn index_retains_only_positive_item_similarity_above_threshold() {
        // u1 and u2 rate p1/p2 in lockstep, so p1~p2 correlates perfectly;
        // p3 is rated inversely and must be dropped.
        let mut user_vectors: HashMap<CustomerId, HashMap<ProductId, f64>> = HashMap::new();
        for (user, r1, r2, r3) in
            [("u1", 5.0, 5.0, 1.0), ("u2", 4.0, 4.0, 2.0), ("u3", 1.0, 1.0, 5.0)]
        {
            let mut vector = HashMap::new();
            vector.insert(ProductId::new("p1"), r1);
            vector.insert(ProductId::new("p2"), r2);
            vector.insert(ProductId::new("p3"), r3);
            user_vectors.insert(CustomerId::new(user), vector);
        }

        let config =
            SimilarityConfig { min_common_raters: 2, min_similarity: 0.3, top_k_users: 10 };
        let index = SimilarityIndex::compute(&user_vectors, &config);

        let similar = index.similar_products(&ProductId::new("p1")).expect("p1 neighbors");
        assert!(similar.get(&ProductId::new("p2")).copied().unwrap_or(0.0) > 0.3);
        assert!(!similar.contains_key(&ProductId::new("p3")));
    }

    #[test]
    fn similar_users_are_ranked_and_truncated() {
        let mut user_vectors: HashMap<CustomerId, HashMap<ProductId, f64>> = HashMap::new();
        for (user, ratings) in [
            ("target", vec![("p1", 5.0), ("p2", 3.0)]),
            ("close", vec![("p1", 5.0), ("p2", 3.0)]),
            ("partial", vec![("p1", 5.0)]),
            ("disjoint", vec![("p9", 1.0)]),
        ] {
            let vector =
                ratings.into_iter().map(|(p, r)| (ProductId::new(p), r)).collect::<HashMap<_, _>>();
            user_vectors.insert(CustomerId::new(user), vector);
        }

        let config =
            SimilarityConfig { min_common_raters: 2, min_similarity: 0.3, top_k_users: 10 };
        let index = SimilarityIndex::compute(&user_vectors, &config);

        let neighbors = index.similar_users(&CustomerId::new("target"), 1);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].0, CustomerId::new("close"));
        assert!(neighbors[0].1 > 0.99);
    }
}
