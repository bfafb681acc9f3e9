use std::collections::HashMap;
use std::path::Path;

use basketwise_core::config::EngineConfig;
use basketwise_core::domain::{Order, Product, ProductId};
use basketwise_core::AffinityAnalyzer;
use serde_json::json;

use crate::commands::CommandResult;
use crate::fixtures::load_json;

/// Mines association rules, sequential patterns, category affinities, and
/// bundles from an order fixture, reporting headline counts and the
/// strongest rules.
pub fn run(
    config: &EngineConfig,
    orders_path: &Path,
    products_path: &Path,
    min_support: Option<f64>,
    min_confidence: Option<f64>,
) -> CommandResult {
    let orders: Vec<Order> = match load_json(orders_path, "orders") {
        Ok(orders) => orders,
        Err(error) => return CommandResult::failure("mine", "fixture", format!("{error:#}"), 2),
    };
    let products: Vec<Product> = match load_json(products_path, "products") {
        Ok(products) => products,
        Err(error) => return CommandResult::failure("mine", "fixture", format!("{error:#}"), 2),
    };

    let catalog: HashMap<ProductId, Product> =
        products.into_iter().map(|product| (product.id.clone(), product)).collect();

    let analyzer = AffinityAnalyzer::new(config.affinity.clone());
    let model = analyzer.analyze_with_thresholds(
        &orders,
        &catalog,
        min_support.unwrap_or(config.affinity.min_support),
        min_confidence.unwrap_or(config.affinity.min_confidence),
    );

    let top_rules: Vec<_> = model.rules.iter().take(5).collect();
    let sequential_pairs: usize = model.sequential.values().map(|followers| followers.len()).sum();

    let data = json!({
        "orders": model.total_orders,
        "rules": model.rules.len(),
        "top_rules": top_rules,
        "sequential_pairs": sequential_pairs,
        "category_pairs": model.category_affinity.len(),
        "bundles": model.bundles,
    });

    CommandResult::success_with_data(
        "mine",
        format!(
            "mined {} rules and {} bundles from {} orders",
            model.rules.len(),
            model.bundles.len(),
            model.total_orders
        ),
        data,
    )
}
