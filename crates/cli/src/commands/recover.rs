use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use basketwise_core::config::EngineConfig;
use basketwise_core::domain::{Cart, Product};
use basketwise_core::optimizer::RecoveryStrategy;
use basketwise_core::sources::{InMemoryCatalogSource, InMemoryEventSource};
use basketwise_core::state::EngineState;
use basketwise_core::{CartOptimizer, RecommendationEngine};

use crate::commands::{build_runtime, CommandResult};
use crate::fixtures::load_json;

/// Scores one recovery attempt for the cart fixture.
pub fn run(
    config: EngineConfig,
    cart_path: &Path,
    products_path: &Path,
    strategy: &str,
) -> CommandResult {
    let strategy = match RecoveryStrategy::from_str(strategy) {
        Ok(strategy) => strategy,
        Err(error) => {
            return CommandResult::failure("recover", "invalid_strategy", error.to_string(), 2)
        }
    };

    let cart: Cart = match load_json(cart_path, "cart") {
        Ok(cart) => cart,
        Err(error) => return CommandResult::failure("recover", "fixture", format!("{error:#}"), 2),
    };
    let products: Vec<Product> = match load_json(products_path, "products") {
        Ok(products) => products,
        Err(error) => return CommandResult::failure("recover", "fixture", format!("{error:#}"), 2),
    };

    let state = Arc::new(EngineState::new(config));
    let recommender = Arc::new(RecommendationEngine::new(
        Arc::clone(&state),
        Arc::new(InMemoryEventSource::default()),
    ));
    let optimizer = CartOptimizer::new(
        Arc::clone(&state),
        Arc::new(InMemoryCatalogSource::new(products)),
        recommender,
    );

    let cart_id = cart.id.clone();
    state.upsert_cart(cart);

    let runtime = match build_runtime("recover") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(optimizer.recover_abandoned_cart(&cart_id, strategy)) {
        Ok(plan) => {
            let message = format!(
                "recovery probability {:.2} for cart {} via {}",
                plan.estimated_recovery_probability, plan.cart_id, plan.strategy
            );
            match serde_json::to_value(&plan) {
                Ok(data) => CommandResult::success_with_data("recover", message, data),
                Err(error) => {
                    CommandResult::failure("recover", "serialization", error.to_string(), 5)
                }
            }
        }
        Err(error) => CommandResult::failure("recover", "engine", error.to_string(), 4),
    }
}
