//! Cart optimization and abandoned-cart recovery.
//!
//! The optimizer is the top-level orchestrator: given a cart, it combines
//! the affinity model, the recommendation engine, and catalog data into
//! upsell/cross-sell/bundle suggestions, shipping and quantity nudges,
//! time-limited offers, and an expected-value prediction. Recovery scoring
//! lives here too.

mod engine;
mod recovery;
mod types;

pub use engine::CartOptimizer;
pub use types::{
    BundleOffer, CartOptimization, CrossSellSuggestion, FreeShippingNudge, Incentive,
    IncentiveKind, OfferKind, OptimizationContext, OptimizationRule, QuantityDiscount,
    RecoveryPlan, RecoveryStrategy, RuleAction, RuleCondition, TimeLimitedOffer, UpsellKind,
    UpsellSuggestion, Urgency,
};
