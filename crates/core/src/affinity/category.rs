//! Category-level affinity via pointwise mutual information.

use std::collections::{HashMap, HashSet};

use super::CategoryAffinity;
use crate::domain::{Order, Product, ProductId};

/// PMI per ordered category pair: log2(P(A and B) / (P(A) * P(B))).
/// Products missing from the catalog contribute no category and are skipped.
pub(super) fn analyze_category_affinity(
    orders: &[Order],
    catalog: &HashMap<ProductId, Product>,
) -> Vec<CategoryAffinity> {
    if orders.is_empty() || catalog.is_empty() {
        return Vec::new();
    }

    let mut category_orders: HashMap<String, u64> = HashMap::new();
    let mut pair_orders: HashMap<(String, String), u64> = HashMap::new();

    for order in orders {
        let categories: HashSet<String> = order
            .product_ids()
            .iter()
            .filter_map(|product| catalog.get(product).map(|p| p.category.clone()))
            .collect();

        for category in &categories {
            *category_orders.entry(category.clone()).or_insert(0) += 1;
        }

        let mut sorted: Vec<&String> = categories.iter().collect();
        sorted.sort();
        for (i, a) in sorted.iter().enumerate() {
            for b in sorted.iter().skip(i + 1) {
                *pair_orders.entry(((*a).clone(), (*b).clone())).or_insert(0) += 1;
                *pair_orders.entry(((*b).clone(), (*a).clone())).or_insert(0) += 1;
            }
        }
    }

    let total = orders.len() as f64;
    let mut affinities: Vec<CategoryAffinity> = pair_orders
        .into_iter()
        .filter_map(|((a, b), count)| {
            let p_a = *category_orders.get(&a)? as f64 / total;
            let p_b = *category_orders.get(&b)? as f64 / total;
            let p_ab = count as f64 / total;
            if p_a == 0.0 || p_b == 0.0 {
                return None;
            }

            Some(CategoryAffinity {
                category_a: a,
                category_b: b,
                pmi: (p_ab / (p_a * p_b)).log2(),
                co_occurrences: count,
                support: p_ab,
            })
        })
        .collect();

    affinities.sort_by(|a, b| {
        b.pmi
            .partial_cmp(&a.pmi)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category_a.cmp(&b.category_a))
            .then_with(|| a.category_b.cmp(&b.category_b))
    });

    affinities
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::super::testutil::order;
    use super::analyze_category_affinity;
    use crate::domain::{Product, ProductId};

    fn product(id: &str, category: &str) -> (ProductId, Product) {
        (
            ProductId::new(id),
            Product {
                id: ProductId::new(id),
                name: id.to_string(),
                category: category.to_string(),
                brand: None,
                price: rust_decimal::Decimal::new(1000, 2),
                tags: Vec::new(),
                color: None,
                size: None,
                stock: 10,
                volume_tiers: Vec::new(),
                flash_sale_ends_at: None,
            },
        )
    }

    #[test]
    fn co_purchased_categories_have_positive_pmi() {
        let catalog: HashMap<_, _> =
            [product("p1", "shoes"), product("p2", "socks"), product("p3", "hats")]
                .into_iter()
                .collect();

        let now = Utc::now();
        // shoes+socks always together, hats always alone.
        let orders = vec![
            order("o1", "c1", &["p1", "p2"], now),
            order("o2", "c2", &["p1", "p2"], now),
            order("o3", "c3", &["p3"], now),
        ];

        let affinities = analyze_category_affinity(&orders, &catalog);
        let shoes_socks = affinities
            .iter()
            .find(|a| a.category_a == "shoes" && a.category_b == "socks")
            .expect("shoes-socks affinity");

        assert!(shoes_socks.pmi > 0.0);
        assert_eq!(shoes_socks.co_occurrences, 2);
        assert!((shoes_socks.support - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn rarely_co_purchased_categories_can_go_negative() {
        let catalog: HashMap<_, _> =
            [product("p1", "shoes"), product("p2", "socks")].into_iter().collect();

        let now = Utc::now();
        // Both categories are popular but overlap only once in eight orders.
        let mut orders = vec![order("o0", "c0", &["p1", "p2"], now)];
        for i in 1..=4 {
            orders.push(order(&format!("s{i}"), &format!("cs{i}"), &["p1"], now));
            orders.push(order(&format!("k{i}"), &format!("ck{i}"), &["p2"], now));
        }

        let affinities = analyze_category_affinity(&orders, &catalog);
        assert!(affinities[0].pmi < 0.0);
    }

    #[test]
    fn unknown_products_are_skipped() {
        let catalog: HashMap<_, _> = [product("p1", "shoes")].into_iter().collect();
        let orders = vec![order("o1", "c1", &["p1", "ghost"], Utc::now())];

        assert!(analyze_category_affinity(&orders, &catalog).is_empty());
    }
}
