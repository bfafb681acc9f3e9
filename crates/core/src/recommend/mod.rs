//! Multi-strategy recommendation engine.
//!
//! Six strategies (collaborative, content-based, hybrid, Thompson sampling,
//! session-based, popularity) normalize into one scored recommendation shape
//! and share a common filter pipeline, impression recording, and response
//! logging path.

mod bandit;
mod collaborative;
mod content;
mod engine;
mod filters;
mod types;

pub use engine::RecommendationEngine;
pub use types::{
    Recommendation, RecommendationFilters, RecommendationModel, RecommendationRequest,
    RecommendationResponse, Strategy,
};
