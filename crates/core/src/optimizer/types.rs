//! Suggestion and recovery payload types for the cart optimizer.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AcceptanceConfig;
use crate::domain::{CartId, ProductId};
use crate::errors::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsellKind {
    /// Swap a line item for a pricier alternative in the same category.
    HigherValueAlternative,
    /// Buy more units of the same product to unlock a volume tier.
    QuantityUpsell,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpsellSuggestion {
    pub current_product: ProductId,
    pub suggested_product: ProductId,
    pub kind: UpsellKind,
    /// Additional spend if the shopper accepts.
    pub value_delta: Decimal,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSellSuggestion {
    pub product_id: ProductId,
    pub score: f64,
    pub affinity_score: f64,
    /// Whether a known bundle discount applies if added.
    pub bundle_discount: bool,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleOffer {
    pub products: Vec<ProductId>,
    /// Products the shopper still has to add.
    pub missing_products: Vec<ProductId>,
    pub full_price: Decimal,
    pub bundle_price: Decimal,
    pub savings: Decimal,
    /// Generated from association rules rather than mined itemsets.
    pub dynamic: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FreeShippingNudge {
    pub qualified: bool,
    /// Remaining spend to qualify; zero when already qualified.
    pub remaining: Decimal,
    pub urgency: Option<Urgency>,
    /// In-stock products that would close the gap on their own.
    pub gap_products: Vec<ProductId>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantityDiscount {
    pub product_id: ProductId,
    pub current_quantity: u32,
    /// Nearest tier the shopper has not reached yet.
    pub tier_quantity: u32,
    pub discount_pct: f64,
    /// Discount realized at the tier quantity.
    pub projected_savings: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    FlashSale,
    CartValueBonus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeLimitedOffer {
    pub kind: OfferKind,
    pub product_id: Option<ProductId>,
    pub expires_at: Option<DateTime<Utc>>,
    pub urgency: Urgency,
    pub message: String,
}

/// Condition half of an optimization rule, evaluated against the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RuleCondition {
    CartValueAtLeast(Decimal),
    CartValueBelow(Decimal),
    ItemCountAtLeast(usize),
    ContainsProduct(ProductId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RuleAction {
    /// Discount applied to the predicted final value.
    ApplyDiscountPct(f64),
    SuggestProduct(ProductId),
    ShowMessage(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRule {
    pub name: String,
    pub condition: RuleCondition,
    pub action: RuleAction,
}

/// Per-request optimization context supplied by the caller.
#[derive(Clone, Debug, Default)]
pub struct OptimizationContext {
    pub rules: Vec<OptimizationRule>,
    /// Per-customer historical acceptance rates, overriding the configured
    /// base probabilities when available.
    pub acceptance: Option<AcceptanceConfig>,
}

/// Full optimization payload for one cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartOptimization {
    pub cart_id: CartId,
    pub current_value: Decimal,
    pub upsells: Vec<UpsellSuggestion>,
    pub cross_sells: Vec<CrossSellSuggestion>,
    pub bundle_offers: Vec<BundleOffer>,
    pub free_shipping: Option<FreeShippingNudge>,
    pub quantity_discounts: Vec<QuantityDiscount>,
    pub time_limited_offers: Vec<TimeLimitedOffer>,
    /// Acceptance-weighted expected value increase across all suggestions.
    pub estimated_value_increase: Decimal,
    pub predicted_final_value: Decimal,
    pub applied_rules: Vec<String>,
    pub messages: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Standard,
    Aggressive,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::Standard => "standard",
            RecoveryStrategy::Aggressive => "aggressive",
        }
    }
}

impl FromStr for RecoveryStrategy {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "standard" => Ok(RecoveryStrategy::Standard),
            "aggressive" => Ok(RecoveryStrategy::Aggressive),
            other => Err(EngineError::InvalidStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncentiveKind {
    Discount,
    FreeShipping,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incentive {
    pub kind: IncentiveKind,
    pub discount_pct: Option<f64>,
    pub message: String,
}

/// Outcome of one recovery scoring pass for an abandoned cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub cart_id: CartId,
    pub strategy: RecoveryStrategy,
    pub incentives: Vec<Incentive>,
    pub messaging: String,
    pub estimated_recovery_probability: f64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::RecoveryStrategy;
    use crate::errors::EngineError;

    #[test]
    fn recovery_strategy_parses_known_names() {
        assert_eq!(RecoveryStrategy::from_str("standard").unwrap(), RecoveryStrategy::Standard);
        assert_eq!(RecoveryStrategy::from_str("aggressive").unwrap(), RecoveryStrategy::Aggressive);
    }

    #[test]
    fn unknown_recovery_strategy_is_an_explicit_error() {
        assert_eq!(
            RecoveryStrategy::from_str("pushy").unwrap_err(),
            EngineError::InvalidStrategy("pushy".to_string())
        );
    }
}
