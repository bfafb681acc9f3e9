//! Abandoned-cart recovery scoring.

use chrono::{Duration, Utc};
use tracing::info;

use super::engine::CartOptimizer;
use super::types::{Incentive, IncentiveKind, RecoveryPlan, RecoveryStrategy};
use crate::domain::{Cart, CartId, RecoveryAttempt};
use crate::errors::EngineResult;

impl CartOptimizer {
    /// Scores a recovery attempt for an abandoned cart and appends it to the
    /// cart's attempt log.
    ///
    /// The base probability decays with time since the cart went idle; the
    /// chosen strategy and stock-scarcity signals adjust it, capped at 0.95.
    pub async fn recover_abandoned_cart(
        &self,
        cart_id: &CartId,
        strategy: RecoveryStrategy,
    ) -> EngineResult<RecoveryPlan> {
        let cart = self.state().cart(cart_id)?;
        let now = Utc::now();

        let elapsed = now - cart.last_updated;
        let mut probability = base_probability(elapsed);
        let mut incentives = Vec::new();

        match strategy {
            RecoveryStrategy::Aggressive => {
                let discount_pct = if elapsed < Duration::hours(24) { 0.10 } else { 0.15 };
                incentives.push(Incentive {
                    kind: IncentiveKind::Discount,
                    discount_pct: Some(discount_pct),
                    message: format!(
                        "Come back and take {:.0}% off your order",
                        discount_pct * 100.0
                    ),
                });
                probability += 0.15;
            }
            RecoveryStrategy::Standard => {
                incentives.push(Incentive {
                    kind: IncentiveKind::FreeShipping,
                    discount_pct: None,
                    message: "Complete your order with free shipping".to_string(),
                });
                probability += 0.08;
            }
        }

        let messaging = if self.has_low_stock_item(&cart).await {
            probability += 0.10;
            "Items in your cart are almost sold out".to_string()
        } else {
            "Shoppers like you loved what's in your cart".to_string()
        };

        probability = probability.min(0.95);

        self.state().update_cart(cart_id, |cart| {
            cart.recovery_attempts.push(RecoveryAttempt {
                attempted_at: now,
                strategy: strategy.as_str().to_string(),
                estimated_probability: probability,
            });
        })?;

        info!(
            cart = %cart_id,
            strategy = %strategy,
            probability,
            "recovery attempt scored"
        );

        Ok(RecoveryPlan {
            cart_id: cart_id.clone(),
            strategy,
            incentives,
            messaging,
            estimated_recovery_probability: probability,
        })
    }

    /// Live stock check against the catalog source; unknown products are
    /// treated as adequately stocked.
    async fn has_low_stock_item(&self, cart: &Cart) -> bool {
        let threshold = self.state().config.optimizer.low_stock_threshold;
        for item in &cart.items {
            if let Ok(Some(product)) = self.catalog.find_product(&item.product_id).await {
                if product.stock < threshold {
                    return true;
                }
            }
        }
        false
    }
}

/// Recovery probability decays with time since the cart went idle.
fn base_probability(elapsed: chrono::Duration) -> f64 {
    if elapsed < Duration::hours(1) {
        0.65
    } else if elapsed < Duration::hours(6) {
        0.45
    } else if elapsed < Duration::hours(24) {
        0.30
    } else if elapsed < Duration::hours(72) {
        0.15
    } else {
        0.05
    }
}
