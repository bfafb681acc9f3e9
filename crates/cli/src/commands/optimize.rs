use std::path::Path;
use std::sync::Arc;

use basketwise_core::config::EngineConfig;
use basketwise_core::domain::{Cart, Order, Product};
use basketwise_core::optimizer::OptimizationContext;
use basketwise_core::sources::{InMemoryCatalogSource, InMemoryEventSource};
use basketwise_core::state::EngineState;
use basketwise_core::{CartOptimizer, RecommendationEngine};

use crate::commands::{build_runtime, CommandResult};
use crate::fixtures::load_json;

/// Runs the full optimization pipeline for a cart fixture. When an orders
/// fixture is supplied, affinities are mined first so cross-sells and bundle
/// offers have data to draw on.
pub fn run(
    config: EngineConfig,
    cart_path: &Path,
    products_path: &Path,
    orders_path: Option<&Path>,
) -> CommandResult {
    let cart: Cart = match load_json(cart_path, "cart") {
        Ok(cart) => cart,
        Err(error) => return CommandResult::failure("optimize", "fixture", format!("{error:#}"), 2),
    };
    let products: Vec<Product> = match load_json(products_path, "products") {
        Ok(products) => products,
        Err(error) => return CommandResult::failure("optimize", "fixture", format!("{error:#}"), 2),
    };
    let orders: Vec<Order> = match orders_path {
        Some(path) => match load_json(path, "orders") {
            Ok(orders) => orders,
            Err(error) => {
                return CommandResult::failure("optimize", "fixture", format!("{error:#}"), 2)
            }
        },
        None => Vec::new(),
    };

    let min_support = config.affinity.min_support;
    let min_confidence = config.affinity.min_confidence;
    let state = Arc::new(EngineState::new(config));
    let recommender = Arc::new(RecommendationEngine::new(
        Arc::clone(&state),
        Arc::new(InMemoryEventSource::default()),
    ));
    recommender.train_content_model(&products);
    if !orders.is_empty() {
        recommender.analyze_frequently_bought_together(&orders, min_support, min_confidence);
    }

    let optimizer = CartOptimizer::new(
        Arc::clone(&state),
        Arc::new(InMemoryCatalogSource::new(products)),
        recommender,
    );

    let runtime = match build_runtime("optimize") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(optimizer.optimize_cart(cart, &OptimizationContext::default())) {
        Ok(optimization) => {
            let message = format!(
                "cart {} at {} with estimated increase {}",
                optimization.cart_id, optimization.current_value,
                optimization.estimated_value_increase
            );
            match serde_json::to_value(&optimization) {
                Ok(data) => CommandResult::success_with_data("optimize", message, data),
                Err(error) => {
                    CommandResult::failure("optimize", "serialization", error.to_string(), 5)
                }
            }
        }
        Err(error) => CommandResult::failure("optimize", "engine", error.to_string(), 4),
    }
}
