use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use basketwise_core::config::EngineConfig;
use basketwise_core::domain::{Product, ProductId, Purchase, SessionEvent, SessionId};
use basketwise_core::recommend::{RecommendationRequest, Strategy};
use basketwise_core::sources::InMemoryEventSource;
use basketwise_core::state::EngineState;
use basketwise_core::RecommendationEngine;

use crate::commands::{build_runtime, CommandResult};
use crate::fixtures::load_json;

#[derive(Debug)]
pub struct Args {
    pub purchases: PathBuf,
    pub products: PathBuf,
    pub events: Option<PathBuf>,
    pub strategy: String,
    pub customer: Option<String>,
    pub session: Option<String>,
    pub context: Vec<String>,
    pub max: usize,
}

/// Trains the collaborative and content models from fixtures, then serves
/// one recommendation request.
pub fn run(config: EngineConfig, args: Args) -> CommandResult {
    let strategy = match Strategy::from_str(&args.strategy) {
        Ok(strategy) => strategy,
        Err(error) => {
            return CommandResult::failure("recommend", "invalid_strategy", error.to_string(), 2)
        }
    };

    let purchases: Vec<Purchase> = match load_json(&args.purchases, "purchases") {
        Ok(purchases) => purchases,
        Err(error) => {
            return CommandResult::failure("recommend", "fixture", format!("{error:#}"), 2)
        }
    };
    let products: Vec<Product> = match load_json(&args.products, "products") {
        Ok(products) => products,
        Err(error) => {
            return CommandResult::failure("recommend", "fixture", format!("{error:#}"), 2)
        }
    };
    let events: HashMap<SessionId, Vec<SessionEvent>> = match &args.events {
        Some(path) => match load_json(path, "events") {
            Ok(events) => events,
            Err(error) => {
                return CommandResult::failure("recommend", "fixture", format!("{error:#}"), 2)
            }
        },
        None => HashMap::new(),
    };

    let state = Arc::new(EngineState::new(config));
    let engine =
        RecommendationEngine::new(Arc::clone(&state), Arc::new(InMemoryEventSource::new(events)));
    engine.train_content_model(&products);
    engine.train_collaborative_model(&purchases);

    let mut request = RecommendationRequest::new(strategy)
        .with_max_recommendations(args.max)
        .with_context_products(args.context.iter().map(ProductId::new).collect());
    if let Some(customer) = args.customer {
        request = request.with_customer(customer);
    }
    if let Some(session) = args.session {
        request = request.with_session(session);
    }

    let runtime = match build_runtime("recommend") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(engine.generate_recommendations(request)) {
        Ok(response) => {
            let count = response.recommendations.len();
            match serde_json::to_value(&response) {
                Ok(data) => CommandResult::success_with_data(
                    "recommend",
                    format!("{count} recommendations via {strategy}"),
                    data,
                ),
                Err(error) => {
                    CommandResult::failure("recommend", "serialization", error.to_string(), 5)
                }
            }
        }
        Err(error) => CommandResult::failure("recommend", "engine", error.to_string(), 4),
    }
}
