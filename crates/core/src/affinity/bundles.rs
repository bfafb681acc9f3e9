//! Level-wise frequent-itemset discovery (Apriori candidate join).

use std::collections::{BTreeSet, HashSet};

use super::ProductBundle;
use crate::domain::Order;

/// Discovers frequent product bundles by iterative itemset extension.
///
/// Starts from frequent pairs meeting `min_support`, then joins itemsets
/// that differ by exactly one product and re-checks support against the
/// order set. The loop is bounded by `max_products`, so it always
/// terminates even on dense data. Results are filtered to
/// `[min_products, max_products]` and sorted by descending support.
pub(super) fn find_product_bundles(
    orders: &[Order],
    min_support: f64,
    min_products: usize,
    max_products: usize,
) -> Vec<ProductBundle> {
    if orders.is_empty() || min_products > max_products {
        return Vec::new();
    }

    let transactions: Vec<BTreeSet<_>> =
        orders.iter().map(|order| order.product_ids().into_iter().collect()).collect();
    let total = transactions.len() as f64;

    let support_of = |itemset: &BTreeSet<_>| -> f64 {
        let hits = transactions.iter().filter(|txn| itemset.is_subset(txn)).count();
        hits as f64 / total
    };

    // Level 2: all frequent pairs.
    let mut pair_candidates: HashSet<BTreeSet<_>> = HashSet::new();
    for txn in &transactions {
        let products: Vec<_> = txn.iter().cloned().collect();
        for (i, a) in products.iter().enumerate() {
            for b in products.iter().skip(i + 1) {
                pair_candidates.insert([a.clone(), b.clone()].into_iter().collect());
            }
        }
    }

    let mut current_level: Vec<(BTreeSet<_>, f64)> = pair_candidates
        .into_iter()
        .filter_map(|itemset| {
            let support = support_of(&itemset);
            (support >= min_support).then_some((itemset, support))
        })
        .collect();

    let mut frequent = current_level.clone();

    // Extend level by level until nothing survives or the size cap is hit.
    let mut size = 2;
    while !current_level.is_empty() && size < max_products {
        let mut candidates: HashSet<BTreeSet<_>> = HashSet::new();

        for (i, (a, _)) in current_level.iter().enumerate() {
            for (b, _) in current_level.iter().skip(i + 1) {
                let union: BTreeSet<_> = a.union(b).cloned().collect();
                // Joining two k-itemsets that differ by one product yields k+1.
                if union.len() == size + 1 {
                    candidates.insert(union);
                }
            }
        }

        current_level = candidates
            .into_iter()
            .filter_map(|itemset| {
                let support = support_of(&itemset);
                (support >= min_support).then_some((itemset, support))
            })
            .collect();

        frequent.extend(current_level.iter().cloned());
        size += 1;
    }

    let mut bundles: Vec<ProductBundle> = frequent
        .into_iter()
        .filter(|(itemset, _)| itemset.len() >= min_products && itemset.len() <= max_products)
        .map(|(itemset, support)| ProductBundle {
            products: itemset.into_iter().collect(),
            support,
        })
        .collect();

    bundles.sort_by(|a, b| {
        b.support
            .partial_cmp(&a.support)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.products.cmp(&b.products))
    });

    bundles
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::super::testutil::order;
    use super::find_product_bundles;
    use crate::domain::ProductId;

    #[test]
    fn frequent_triple_is_discovered() {
        let now = Utc::now();
        let orders = vec![
            order("o1", "c1", &["a", "b", "c"], now),
            order("o2", "c2", &["a", "b", "c"], now),
            order("o3", "c3", &["a", "b", "c", "d"], now),
            order("o4", "c4", &["e"], now),
        ];

        let bundles = find_product_bundles(&orders, 0.5, 2, 5);
        let triple = bundles
            .iter()
            .find(|bundle| bundle.products.len() == 3)
            .expect("abc bundle");

        assert_eq!(
            triple.products,
            vec![ProductId::new("a"), ProductId::new("b"), ProductId::new("c")]
        );
        assert!((triple.support - 0.75).abs() < 1e-12);
    }

    #[test]
    fn bundle_sizes_respect_bounds() {
        let now = Utc::now();
        let orders: Vec<_> = (0..4)
            .map(|i| order(&format!("o{i}"), &format!("c{i}"), &["a", "b", "c", "d"], now))
            .collect();

        let bundles = find_product_bundles(&orders, 0.5, 3, 3);
        assert!(!bundles.is_empty());
        assert!(bundles.iter().all(|bundle| bundle.size() == 3));
    }

    #[test]
    fn infrequent_pairs_are_pruned() {
        let now = Utc::now();
        let orders = vec![
            order("o1", "c1", &["a", "b"], now),
            order("o2", "c2", &["c"], now),
            order("o3", "c3", &["d"], now),
            order("o4", "c4", &["e"], now),
        ];

        assert!(find_product_bundles(&orders, 0.5, 2, 5).is_empty());
    }

    #[test]
    fn bundles_sorted_by_support_descending() {
        let now = Utc::now();
        let orders = vec![
            order("o1", "c1", &["a", "b"], now),
            order("o2", "c2", &["a", "b"], now),
            order("o3", "c3", &["a", "b"], now),
            order("o4", "c4", &["c", "d"], now),
        ];

        let bundles = find_product_bundles(&orders, 0.25, 2, 5);
        assert!(bundles.windows(2).all(|pair| pair[0].support >= pair[1].support));
        assert_eq!(
            bundles[0].products,
            vec![ProductId::new("a"), ProductId::new("b")]
        );
    }

    #[test]
    fn empty_orders_produce_no_bundles() {
        assert!(find_product_bundles(&[], 0.1, 2, 5).is_empty());
    }
}
