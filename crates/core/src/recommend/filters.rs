//! Shared candidate filter pipeline.

use std::collections::HashMap;

use super::types::{Recommendation, RecommendationFilters};
use crate::domain::{Product, ProductId};

/// Applies exclusions, category, price-range, and stock filters in order.
/// Candidates missing from the catalog are dropped whenever a
/// catalog-dependent filter is active, and passed through otherwise.
pub(super) fn apply_filters(
    recommendations: Vec<Recommendation>,
    catalog: &HashMap<ProductId, Product>,
    filters: &RecommendationFilters,
) -> Vec<Recommendation> {
    let needs_catalog = !filters.categories.is_empty()
        || filters.min_price.is_some()
        || filters.max_price.is_some()
        || filters.in_stock_only;

    recommendations
        .into_iter()
        .filter(|rec| {
            if filters.exclude.contains(&rec.product_id) {
                return false;
            }

            let Some(product) = catalog.get(&rec.product_id) else {
                return !needs_catalog;
            };

            if !filters.categories.is_empty() && !filters.categories.contains(&product.category) {
                return false;
            }
            if let Some(min) = filters.min_price {
                if product.price < min {
                    return false;
                }
            }
            if let Some(max) = filters.max_price {
                if product.price > max {
                    return false;
                }
            }
            if filters.in_stock_only && !product.in_stock() {
                return false;
            }

            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use super::apply_filters;
    use crate::domain::{Product, ProductId};
    use crate::recommend::types::{Recommendation, RecommendationFilters, RecommendationModel};

    fn rec(id: &str) -> Recommendation {
        Recommendation {
            product_id: ProductId::new(id),
            score: 1.0,
            confidence: 1.0,
            reasoning: Vec::new(),
            model: RecommendationModel::Popularity,
        }
    }

    fn product(id: &str, category: &str, price: i64, stock: u32) -> (ProductId, Product) {
        (
            ProductId::new(id),
            Product {
                id: ProductId::new(id),
                name: id.to_string(),
                category: category.to_string(),
                brand: None,
                price: Decimal::new(price, 2),
                tags: Vec::new(),
                color: None,
                size: None,
                stock,
                volume_tiers: Vec::new(),
                flash_sale_ends_at: None,
            },
        )
    }

    #[test]
    fn filters_apply_category_price_stock_and_exclusions() {
        let catalog: HashMap<_, _> = [
            product("keep", "shoes", 5000, 5),
            product("wrong-category", "hats", 5000, 5),
            product("too-cheap", "shoes", 100, 5),
            product("out-of-stock", "shoes", 5000, 0),
            product("excluded", "shoes", 5000, 5),
        ]
        .into_iter()
        .collect();

        let filters = RecommendationFilters {
            categories: vec!["shoes".to_string()],
            min_price: Some(Decimal::new(1000, 2)),
            max_price: None,
            in_stock_only: true,
            exclude: vec![ProductId::new("excluded")],
        };

        let kept = apply_filters(
            vec![
                rec("keep"),
                rec("wrong-category"),
                rec("too-cheap"),
                rec("out-of-stock"),
                rec("excluded"),
            ],
            &catalog,
            &filters,
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].product_id, ProductId::new("keep"));
    }

    #[test]
    fn unknown_products_pass_when_no_catalog_filter_active() {
        let filters = RecommendationFilters::default();
        let kept = apply_filters(vec![rec("ghost")], &HashMap::new(), &filters);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn unknown_products_drop_when_catalog_filter_active() {
        let filters = RecommendationFilters { in_stock_only: true, ..Default::default() };
        let kept = apply_filters(vec![rec("ghost")], &HashMap::new(), &filters);
        assert!(kept.is_empty());
    }
}
