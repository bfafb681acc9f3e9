//! Request/response types for the recommendation engine.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{CustomerId, ProductId, SessionId};
use crate::errors::EngineError;

/// Selectable recommendation strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Collaborative,
    ContentBased,
    Hybrid,
    ThompsonSampling,
    SessionBased,
    Popularity,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Collaborative => "collaborative",
            Strategy::ContentBased => "content_based",
            Strategy::Hybrid => "hybrid",
            Strategy::ThompsonSampling => "thompson_sampling",
            Strategy::SessionBased => "session_based",
            Strategy::Popularity => "popularity",
        }
    }
}

impl FromStr for Strategy {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "collaborative" => Ok(Strategy::Collaborative),
            "content_based" | "content" => Ok(Strategy::ContentBased),
            "hybrid" => Ok(Strategy::Hybrid),
            "thompson_sampling" | "thompson" => Ok(Strategy::ThompsonSampling),
            "session_based" | "session" => Ok(Strategy::SessionBased),
            "popularity" => Ok(Strategy::Popularity),
            other => Err(EngineError::InvalidStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which model produced a recommendation. Every strategy normalizes into the
/// same [`Recommendation`] record tagged with its source model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationModel {
    Collaborative,
    ContentBased,
    Hybrid,
    ThompsonSampling,
    SessionBased,
    Trending,
    Popularity,
}

/// Uniform scored recommendation produced by every strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub score: f64,
    /// Normalized confidence in [0, 1].
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub model: RecommendationModel,
}

/// Shared candidate filter pipeline applied to every strategy's output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationFilters {
    /// Keep only these categories when non-empty.
    #[serde(default)]
    pub categories: Vec<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub in_stock_only: bool,
    #[serde(default)]
    pub exclude: Vec<ProductId>,
}

#[derive(Clone, Debug)]
pub struct RecommendationRequest {
    pub customer_id: Option<CustomerId>,
    pub session_id: Option<SessionId>,
    /// Products in the caller's current context (viewed product, cart, ...).
    pub context_products: Vec<ProductId>,
    pub strategy: Strategy,
    pub max_recommendations: usize,
    pub filters: RecommendationFilters,
    /// Per-request budget; exceeded requests degrade to popularity.
    pub timeout: Option<Duration>,
}

impl RecommendationRequest {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            customer_id: None,
            session_id: None,
            context_products: Vec::new(),
            strategy,
            max_recommendations: 10,
            filters: RecommendationFilters::default(),
            timeout: None,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(CustomerId::new(customer_id));
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(SessionId::new(session_id));
        self
    }

    pub fn with_context_products(mut self, products: Vec<ProductId>) -> Self {
        self.context_products = products;
        self
    }

    pub fn with_max_recommendations(mut self, max: usize) -> Self {
        self.max_recommendations = max;
        self
    }

    pub fn with_filters(mut self, filters: RecommendationFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Served recommendation payload; valid until `expires_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub id: String,
    pub recommendations: Vec<Recommendation>,
    pub strategy: Strategy,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
