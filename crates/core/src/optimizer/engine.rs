//! Cart optimization pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::types::{
    BundleOffer, CartOptimization, CrossSellSuggestion, FreeShippingNudge, OfferKind,
    OptimizationContext, QuantityDiscount, RuleAction, RuleCondition, TimeLimitedOffer,
    UpsellKind, UpsellSuggestion, Urgency,
};
use crate::config::AcceptanceConfig;
use crate::domain::{Cart, Product, ProductId, VolumeTier};
use crate::errors::EngineResult;
use crate::recommend::{
    RecommendationEngine, RecommendationFilters, RecommendationRequest, Strategy,
};
use crate::similarity::cosine_similarity;
use crate::sources::CatalogSource;
use crate::state::{EngineState, TrainingSnapshot};

/// Cart-value band that unlocks the bonus offer.
const BONUS_MIN: Decimal = Decimal::from_parts(5000, 0, 0, false, 2);
const BONUS_MAX: Decimal = Decimal::from_parts(10000, 0, 0, false, 2);

/// Top-level orchestrator over the affinity model, the recommendation
/// engine, and the cart registry.
pub struct CartOptimizer {
    state: Arc<EngineState>,
    pub(super) catalog: Arc<dyn CatalogSource>,
    recommender: Arc<RecommendationEngine>,
}

impl CartOptimizer {
    pub fn new(
        state: Arc<EngineState>,
        catalog: Arc<dyn CatalogSource>,
        recommender: Arc<RecommendationEngine>,
    ) -> Self {
        Self { state, catalog, recommender }
    }

    pub(super) fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    /// Runs the full suggestion pipeline for one cart: upsells, cross-sells,
    /// bundle offers, free-shipping and quantity nudges, time-limited
    /// offers, expected-value prediction, and the rule overlay.
    ///
    /// An empty cart yields empty suggestion arrays and a zero estimate,
    /// never an error.
    pub async fn optimize_cart(
        &self,
        mut cart: Cart,
        context: &OptimizationContext,
    ) -> EngineResult<CartOptimization> {
        let current_value = cart.current_value();
        cart.optimization_attempts += 1;
        cart.last_updated = Utc::now();
        self.state.upsert_cart(cart.clone());

        let mut optimization = CartOptimization {
            cart_id: cart.id.clone(),
            current_value,
            upsells: Vec::new(),
            cross_sells: Vec::new(),
            bundle_offers: Vec::new(),
            free_shipping: None,
            quantity_discounts: Vec::new(),
            time_limited_offers: Vec::new(),
            estimated_value_increase: Decimal::ZERO,
            predicted_final_value: current_value,
            applied_rules: Vec::new(),
            messages: Vec::new(),
        };

        if cart.items.is_empty() {
            debug!(cart = %cart.id, "empty cart, nothing to optimize");
            return Ok(optimization);
        }

        let snapshot = self.state.training();
        let config = &self.state.config.optimizer;

        optimization.upsells = self.find_upsells(&cart, &snapshot);
        optimization.cross_sells = self.find_cross_sells(&cart).await;
        optimization.bundle_offers = self.find_bundle_offers(&cart, &snapshot);
        optimization.free_shipping = self.free_shipping_nudge(current_value, &snapshot);
        optimization.quantity_discounts = self.quantity_discounts(&cart, &snapshot);
        optimization.time_limited_offers = self.time_limited_offers(&cart, current_value, &snapshot);

        let acceptance = context.acceptance.as_ref().unwrap_or(&config.acceptance);
        optimization.estimated_value_increase =
            self.estimate_value_increase(&optimization, &snapshot, acceptance);
        optimization.predicted_final_value =
            current_value + optimization.estimated_value_increase;

        self.apply_rules(&cart, context, &mut optimization);

        info!(
            cart = %cart.id,
            value = %current_value,
            upsells = optimization.upsells.len(),
            cross_sells = optimization.cross_sells.len(),
            bundles = optimization.bundle_offers.len(),
            estimated_increase = %optimization.estimated_value_increase,
            "cart optimized"
        );

        Ok(optimization)
    }

    /// Higher-priced same-category alternatives within the configured price
    /// increase band, ranked by feature similarity, plus quantity upsells
    /// for single-unit lines that have a volume tier.
    fn find_upsells(&self, cart: &Cart, snapshot: &TrainingSnapshot) -> Vec<UpsellSuggestion> {
        let config = &self.state.config.optimizer;
        let mut upsells = Vec::new();

        for item in &cart.items {
            let Some(product) = snapshot.catalog.get(&item.product_id) else {
                continue;
            };

            if let Some(alternative) = self.best_alternative(product, cart, snapshot) {
                let value_delta =
                    (alternative.price - product.price) * Decimal::from(item.quantity);
                upsells.push(UpsellSuggestion {
                    current_product: item.product_id.clone(),
                    suggested_product: alternative.id.clone(),
                    kind: UpsellKind::HigherValueAlternative,
                    value_delta,
                    message: format!("Upgrade to {} for {} more", alternative.name, value_delta),
                });
            }

            if item.quantity == 1 {
                let tiers = volume_tiers(product, config);
                if let Some(tier) = tiers.first() {
                    let discounted_unit = product.price * decimal_from(1.0 - tier.discount_pct);
                    let value_delta =
                        discounted_unit * Decimal::from(tier.min_quantity) - product.price;
                    upsells.push(UpsellSuggestion {
                        current_product: item.product_id.clone(),
                        suggested_product: item.product_id.clone(),
                        kind: UpsellKind::QuantityUpsell,
                        value_delta,
                        message: format!(
                            "Buy {} and save {:.0}%",
                            tier.min_quantity,
                            tier.discount_pct * 100.0
                        ),
                    });
                }
            }
        }

        upsells
    }

    /// Best in-stock, same-category alternative whose price increase falls
    /// inside the configured band, preferring the most feature-similar one.
    fn best_alternative<'a>(
        &self,
        product: &Product,
        cart: &Cart,
        snapshot: &'a TrainingSnapshot,
    ) -> Option<&'a Product> {
        let config = &self.state.config.optimizer;
        if product.price <= Decimal::ZERO {
            return None;
        }

        let mut candidates: Vec<(&Product, f64)> = snapshot
            .catalog
            .values()
            .filter(|candidate| {
                candidate.id != product.id
                    && candidate.category == product.category
                    && candidate.in_stock()
                    && !cart.contains(&candidate.id)
            })
            .filter(|candidate| {
                let increase = ((candidate.price - product.price) / product.price)
                    .to_f64()
                    .unwrap_or(0.0);
                increase > config.upsell_min_increase_pct
                    && increase <= config.upsell_max_increase_pct
            })
            .map(|candidate| {
                let similarity = match (
                    snapshot.feature_vectors.get(&product.id),
                    snapshot.feature_vectors.get(&candidate.id),
                ) {
                    (Some(a), Some(b)) => cosine_similarity(a, b),
                    _ => 0.0,
                };
                (candidate, similarity)
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        candidates.first().map(|(candidate, _)| *candidate)
    }

    /// Affinity-derived complements merged with hybrid recommendations when
    /// a customer is known; deduplicated keeping the first occurrence.
    async fn find_cross_sells(&self, cart: &Cart) -> Vec<CrossSellSuggestion> {
        let affinity = self.state.affinity();
        let in_cart: HashSet<ProductId> = cart.product_ids().into_iter().collect();

        let mut suggestions: Vec<CrossSellSuggestion> = Vec::new();
        let mut seen: HashSet<ProductId> = HashSet::new();

        for item in &cart.items {
            for rule in affinity.complementary_products(&item.product_id, 5) {
                if in_cart.contains(&rule.consequent) || !seen.insert(rule.consequent.clone()) {
                    continue;
                }
                let bundle_discount = self.bundle_applies(&affinity, cart, &rule.consequent);
                let mut score = rule.confidence * (1.0 + rule.confidence);
                if bundle_discount {
                    score *= 1.4;
                }
                suggestions.push(CrossSellSuggestion {
                    product_id: rule.consequent.clone(),
                    score,
                    affinity_score: rule.confidence,
                    bundle_discount,
                    message: "Frequently bought together".to_string(),
                });
            }
        }

        if let Some(customer) = cart.customer_id.as_ref() {
            let request = RecommendationRequest::new(Strategy::Hybrid)
                .with_customer(customer.0.clone())
                .with_context_products(cart.product_ids())
                .with_max_recommendations(5)
                .with_filters(RecommendationFilters {
                    exclude: cart.product_ids(),
                    ..Default::default()
                });

            if let Ok(response) = self.recommender.generate_recommendations(request).await {
                for rec in response.recommendations {
                    if !seen.insert(rec.product_id.clone()) {
                        continue;
                    }
                    let bundle_discount = self.bundle_applies(&affinity, cart, &rec.product_id);
                    let mut score = rec.score * (1.0 + rec.confidence);
                    if bundle_discount {
                        score *= 1.4;
                    }
                    suggestions.push(CrossSellSuggestion {
                        product_id: rec.product_id,
                        score,
                        affinity_score: rec.score,
                        bundle_discount,
                        message: "Recommended for you".to_string(),
                    });
                }
            }
        }

        suggestions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });

        suggestions
    }

    fn bundle_applies(
        &self,
        affinity: &crate::affinity::AffinityModel,
        cart: &Cart,
        candidate: &ProductId,
    ) -> bool {
        affinity.bundles.iter().any(|bundle| {
            bundle.products.contains(candidate)
                && bundle.products.iter().any(|product| cart.contains(product))
        })
    }

    /// Mined bundles the cart is 1 to 3 products away from completing, plus
    /// dynamic pair bundles synthesized from the strongest association rule
    /// of each cart item.
    fn find_bundle_offers(&self, cart: &Cart, snapshot: &TrainingSnapshot) -> Vec<BundleOffer> {
        let affinity = self.state.affinity();
        let discount = decimal_from(1.0 - self.state.config.affinity.bundle_discount_pct);
        let mut offers: Vec<BundleOffer> = Vec::new();

        for bundle in &affinity.bundles {
            let missing: Vec<ProductId> = bundle
                .products
                .iter()
                .filter(|product| !cart.contains(product))
                .cloned()
                .collect();
            if missing.is_empty() || missing.len() > 3 || missing.len() == bundle.size() {
                continue;
            }
            if let Some(offer) =
                self.price_bundle(&bundle.products, missing, discount, false, snapshot)
            {
                offers.push(offer);
            }
        }

        for item in &cart.items {
            if let Some(rule) = affinity.complementary_products(&item.product_id, 1).first() {
                if cart.contains(&rule.consequent) {
                    continue;
                }
                let products = vec![rule.antecedent.clone(), rule.consequent.clone()];
                let already_offered = offers.iter().any(|offer| offer.products == products);
                if already_offered {
                    continue;
                }
                if let Some(offer) = self.price_bundle(
                    &products,
                    vec![rule.consequent.clone()],
                    discount,
                    true,
                    snapshot,
                ) {
                    offers.push(offer);
                }
            }
        }

        offers.sort_by(|a, b| b.savings.cmp(&a.savings).then_with(|| a.products.cmp(&b.products)));
        offers
    }

    /// Prices a bundle from catalog data; bundles referencing unknown
    /// products are dropped.
    fn price_bundle(
        &self,
        products: &[ProductId],
        missing: Vec<ProductId>,
        discount_multiplier: Decimal,
        dynamic: bool,
        snapshot: &TrainingSnapshot,
    ) -> Option<BundleOffer> {
        let mut full_price = Decimal::ZERO;
        for product in products {
            full_price += snapshot.catalog.get(product)?.price;
        }
        let bundle_price = full_price * discount_multiplier;

        Some(BundleOffer {
            products: products.to_vec(),
            missing_products: missing,
            full_price,
            bundle_price,
            savings: full_price - bundle_price,
            dynamic,
        })
    }

    /// Threshold nudge: report savings when qualified, suggest gap-closing
    /// products when the cart is within the nudge window.
    fn free_shipping_nudge(
        &self,
        current_value: Decimal,
        snapshot: &TrainingSnapshot,
    ) -> Option<FreeShippingNudge> {
        let config = &self.state.config.optimizer;

        if current_value >= config.free_shipping_threshold {
            return Some(FreeShippingNudge {
                qualified: true,
                remaining: Decimal::ZERO,
                urgency: None,
                gap_products: Vec::new(),
                message: "Your order ships free".to_string(),
            });
        }

        let remaining = config.free_shipping_threshold - current_value;
        if remaining > config.free_shipping_nudge_window {
            return None;
        }

        let urgency = if remaining <= config.free_shipping_high_urgency_gap {
            Urgency::High
        } else {
            Urgency::Medium
        };

        // Cheapest in-stock products that close the gap on their own.
        let mut closers: Vec<&Product> = snapshot
            .catalog
            .values()
            .filter(|product| product.in_stock() && product.price >= remaining)
            .collect();
        closers.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.id.cmp(&b.id)));

        Some(FreeShippingNudge {
            qualified: false,
            remaining,
            urgency: Some(urgency),
            gap_products: closers.into_iter().take(3).map(|product| product.id.clone()).collect(),
            message: format!("Add {remaining} more for free shipping"),
        })
    }

    /// Nearest unmet volume tier per line item, never the whole ladder.
    fn quantity_discounts(&self, cart: &Cart, snapshot: &TrainingSnapshot) -> Vec<QuantityDiscount> {
        let config = &self.state.config.optimizer;
        let mut discounts = Vec::new();

        for item in &cart.items {
            let Some(product) = snapshot.catalog.get(&item.product_id) else {
                continue;
            };
            let tiers = volume_tiers(product, config);
            let Some(tier) = tiers.iter().find(|tier| tier.min_quantity > item.quantity) else {
                continue;
            };

            let projected_savings = item.unit_price
                * Decimal::from(tier.min_quantity)
                * decimal_from(tier.discount_pct);
            discounts.push(QuantityDiscount {
                product_id: item.product_id.clone(),
                current_quantity: item.quantity,
                tier_quantity: tier.min_quantity,
                discount_pct: tier.discount_pct,
                projected_savings,
            });
        }

        discounts
    }

    /// Flash sales ending within 24 hours on cart items, plus the cart-value
    /// bonus offer for mid-range carts.
    fn time_limited_offers(
        &self,
        cart: &Cart,
        current_value: Decimal,
        snapshot: &TrainingSnapshot,
    ) -> Vec<TimeLimitedOffer> {
        let now = Utc::now();
        let mut offers = Vec::new();

        for item in &cart.items {
            let Some(product) = snapshot.catalog.get(&item.product_id) else {
                continue;
            };
            let Some(ends_at) = product.flash_sale_ends_at else {
                continue;
            };
            if ends_at <= now || ends_at - now > Duration::hours(24) {
                continue;
            }

            let urgency =
                if ends_at - now <= Duration::hours(6) { Urgency::High } else { Urgency::Medium };
            offers.push(TimeLimitedOffer {
                kind: OfferKind::FlashSale,
                product_id: Some(item.product_id.clone()),
                expires_at: Some(ends_at),
                urgency,
                message: format!("Flash sale on {} ends soon", product.name),
            });
        }

        if current_value >= BONUS_MIN && current_value < BONUS_MAX {
            let remaining = BONUS_MAX - current_value;
            offers.push(TimeLimitedOffer {
                kind: OfferKind::CartValueBonus,
                product_id: None,
                expires_at: None,
                urgency: Urgency::Medium,
                message: format!("Spend {remaining} more to unlock a bonus gift"),
            });
        }

        offers
    }

    /// Expected value increase: per-category suggestion value weighted by
    /// that category's acceptance probability.
    fn estimate_value_increase(
        &self,
        optimization: &CartOptimization,
        snapshot: &TrainingSnapshot,
        acceptance: &AcceptanceConfig,
    ) -> Decimal {
        let upsell_value: Decimal =
            optimization.upsells.iter().map(|upsell| upsell.value_delta).sum();

        let cross_sell_value: Decimal = optimization
            .cross_sells
            .iter()
            .filter_map(|suggestion| snapshot.catalog.get(&suggestion.product_id))
            .map(|product| product.price)
            .sum();

        // A bundle's incremental value is the discounted price of what the
        // shopper still has to add.
        let discount = decimal_from(1.0 - self.state.config.affinity.bundle_discount_pct);
        let bundle_value: Decimal = optimization
            .bundle_offers
            .iter()
            .map(|offer| {
                offer
                    .missing_products
                    .iter()
                    .filter_map(|product| snapshot.catalog.get(product))
                    .map(|product| product.price * discount)
                    .sum::<Decimal>()
            })
            .sum();

        let shipping_value = optimization
            .free_shipping
            .as_ref()
            .filter(|nudge| !nudge.qualified)
            .map(|nudge| nudge.remaining)
            .unwrap_or(Decimal::ZERO);

        let quantity_value: Decimal = optimization
            .quantity_discounts
            .iter()
            .filter_map(|discount_entry| {
                let product = snapshot.catalog.get(&discount_entry.product_id)?;
                let added_units =
                    discount_entry.tier_quantity.saturating_sub(discount_entry.current_quantity);
                let discounted_unit =
                    product.price * decimal_from(1.0 - discount_entry.discount_pct);
                Some(discounted_unit * Decimal::from(added_units))
            })
            .sum();

        let bonus_value: Decimal = optimization
            .time_limited_offers
            .iter()
            .filter(|offer| offer.kind == OfferKind::CartValueBonus)
            .map(|_| (BONUS_MAX - optimization.current_value).max(Decimal::ZERO))
            .sum();

        upsell_value * decimal_from(acceptance.upsell)
            + cross_sell_value * decimal_from(acceptance.cross_sell)
            + bundle_value * decimal_from(acceptance.bundle)
            + shipping_value * decimal_from(acceptance.free_shipping)
            + quantity_value * decimal_from(acceptance.quantity)
            + bonus_value * decimal_from(acceptance.time_limited)
    }

    /// Final overlay: each matching rule's action is applied and recorded.
    fn apply_rules(
        &self,
        cart: &Cart,
        context: &OptimizationContext,
        optimization: &mut CartOptimization,
    ) {
        for rule in &context.rules {
            let matches = match &rule.condition {
                RuleCondition::CartValueAtLeast(threshold) => {
                    optimization.current_value >= *threshold
                }
                RuleCondition::CartValueBelow(threshold) => optimization.current_value < *threshold,
                RuleCondition::ItemCountAtLeast(count) => cart.items.len() >= *count,
                RuleCondition::ContainsProduct(product) => cart.contains(product),
            };
            if !matches {
                continue;
            }

            match &rule.action {
                RuleAction::ApplyDiscountPct(pct) => {
                    optimization.predicted_final_value *= decimal_from(1.0 - pct);
                }
                RuleAction::SuggestProduct(product) => {
                    if !cart.contains(product)
                        && !optimization
                            .cross_sells
                            .iter()
                            .any(|suggestion| &suggestion.product_id == product)
                    {
                        optimization.cross_sells.push(CrossSellSuggestion {
                            product_id: product.clone(),
                            score: 0.5,
                            affinity_score: 0.5,
                            bundle_discount: false,
                            message: "Picked for this order".to_string(),
                        });
                    }
                }
                RuleAction::ShowMessage(message) => {
                    optimization.messages.push(message.clone());
                }
            }

            optimization.applied_rules.push(rule.name.clone());
        }
    }
}

/// Product's own tiers when present, otherwise the configured defaults.
/// Always sorted by ascending quantity.
fn volume_tiers(product: &Product, config: &crate::config::OptimizerConfig) -> Vec<VolumeTier> {
    let mut tiers: Vec<VolumeTier> = if product.volume_tiers.is_empty() {
        config
            .default_volume_tiers
            .iter()
            .map(|(min_quantity, discount_pct)| VolumeTier {
                min_quantity: *min_quantity,
                discount_pct: *discount_pct,
            })
            .collect()
    } else {
        product.volume_tiers.clone()
    };
    tiers.sort_by_key(|tier| tier.min_quantity);
    tiers
}

fn decimal_from(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::CartOptimizer;
    use crate::config::EngineConfig;
    use crate::domain::{Cart, CartId, CartItem, CustomerId, Product, ProductId, VolumeTier};
    use crate::optimizer::types::{
        OptimizationContext, OptimizationRule, RuleAction, RuleCondition, UpsellKind, Urgency,
    };
    use crate::recommend::RecommendationEngine;
    use crate::sources::InMemoryCatalogSource;
    use crate::state::{EngineState, TrainingSnapshot};

    fn product(id: &str, category: &str, cents: i64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: id.to_string(),
            category: category.to_string(),
            brand: None,
            price: Decimal::new(cents, 2),
            tags: Vec::new(),
            color: None,
            size: None,
            stock,
            volume_tiers: Vec::new(),
            flash_sale_ends_at: None,
        }
    }

    fn item(id: &str, quantity: u32, cents: i64) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            quantity,
            unit_price: Decimal::new(cents, 2),
        }
    }

    fn optimizer_with_catalog(products: Vec<Product>) -> CartOptimizer {
        let state = Arc::new(EngineState::new(EngineConfig::default()));
        let mut snapshot = TrainingSnapshot::default();
        for product in &products {
            snapshot.catalog.insert(product.id.clone(), product.clone());
        }
        state.install_training(snapshot);

        let catalog = Arc::new(InMemoryCatalogSource::new(products));
        let recommender = Arc::new(RecommendationEngine::new(
            Arc::clone(&state),
            Arc::new(crate::sources::InMemoryEventSource::default()),
        ));
        CartOptimizer::new(state, catalog, recommender)
    }

    #[tokio::test]
    async fn empty_cart_yields_empty_suggestions_and_zero_estimate() {
        let optimizer = optimizer_with_catalog(Vec::new());
        let cart = Cart::new(CartId::new("empty"), None, Vec::new());

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        assert!(result.upsells.is_empty());
        assert!(result.cross_sells.is_empty());
        assert_eq!(result.estimated_value_increase, Decimal::ZERO);
        assert_eq!(result.predicted_final_value, Decimal::ZERO);
    }

    #[tokio::test]
    async fn optimization_attempts_are_tracked_on_the_stored_cart() {
        let optimizer = optimizer_with_catalog(Vec::new());
        let cart = Cart::new(CartId::new("c1"), None, vec![item("p1", 1, 1000)]);

        optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        let stored = optimizer.state().cart(&CartId::new("c1")).expect("stored cart");
        assert_eq!(stored.optimization_attempts, 1);
    }

    #[tokio::test]
    async fn upsell_respects_the_price_increase_band() {
        // base $50; candidates at +8% (too close), +25% (in band), +60% (too far).
        let optimizer = optimizer_with_catalog(vec![
            product("base", "shoes", 5000, 9),
            product("barely", "shoes", 5400, 9),
            product("in-band", "shoes", 6250, 9),
            product("too-far", "shoes", 8000, 9),
        ]);
        let cart = Cart::new(CartId::new("c1"), None, vec![item("base", 2, 5000)]);

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        let alternatives: Vec<_> = result
            .upsells
            .iter()
            .filter(|upsell| upsell.kind == UpsellKind::HigherValueAlternative)
            .collect();
        assert_eq!(alternatives.len(), 1);
        assert_eq!(alternatives[0].suggested_product, ProductId::new("in-band"));
        // $12.50 more per unit, two units in the cart.
        assert_eq!(alternatives[0].value_delta, Decimal::new(2500, 2));
    }

    #[tokio::test]
    async fn quantity_upsell_offered_for_single_unit_with_tier() {
        let mut tiered = product("bulk", "pantry", 1000, 50);
        tiered.volume_tiers = vec![VolumeTier { min_quantity: 6, discount_pct: 0.12 }];
        let optimizer = optimizer_with_catalog(vec![tiered]);
        let cart = Cart::new(CartId::new("c1"), None, vec![item("bulk", 1, 1000)]);

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        assert!(result
            .upsells
            .iter()
            .any(|upsell| upsell.kind == UpsellKind::QuantityUpsell));
    }

    #[tokio::test]
    async fn free_shipping_reports_qualified_at_eighty_dollars() {
        let optimizer = optimizer_with_catalog(vec![product("p1", "misc", 8000, 5)]);
        let cart = Cart::new(CartId::new("c1"), None, vec![item("p1", 1, 8000)]);

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        let nudge = result.free_shipping.expect("nudge present");
        assert!(nudge.qualified);
        assert_eq!(nudge.remaining, Decimal::ZERO);
    }

    #[tokio::test]
    async fn free_shipping_nudges_with_high_urgency_at_sixty_five_dollars() {
        let optimizer = optimizer_with_catalog(vec![
            product("p1", "misc", 6500, 5),
            product("closer", "misc", 1200, 5),
        ]);
        let cart = Cart::new(CartId::new("c1"), None, vec![item("p1", 1, 6500)]);

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        let nudge = result.free_shipping.expect("nudge present");
        assert!(!nudge.qualified);
        assert_eq!(nudge.remaining, Decimal::new(1000, 2));
        assert_eq!(nudge.urgency, Some(Urgency::High));
        assert!(nudge.gap_products.contains(&ProductId::new("closer")));
    }

    #[tokio::test]
    async fn no_nudge_when_far_from_the_threshold() {
        let optimizer = optimizer_with_catalog(vec![product("p1", "misc", 2000, 5)]);
        let cart = Cart::new(CartId::new("c1"), None, vec![item("p1", 1, 2000)]);

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        assert!(result.free_shipping.is_none());
    }

    #[tokio::test]
    async fn only_the_nearest_unmet_tier_is_reported() {
        let optimizer = optimizer_with_catalog(vec![product("p1", "pantry", 1000, 50)]);
        // Default tiers are 3/5/10; with 4 units the nearest unmet is 5.
        let cart = Cart::new(CartId::new("c1"), None, vec![item("p1", 4, 1000)]);

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        assert_eq!(result.quantity_discounts.len(), 1);
        assert_eq!(result.quantity_discounts[0].tier_quantity, 5);
        assert_eq!(result.quantity_discounts[0].discount_pct, 0.15);
    }

    #[tokio::test]
    async fn cart_value_bonus_offered_in_the_fifty_to_hundred_band() {
        let optimizer = optimizer_with_catalog(vec![product("p1", "misc", 6000, 5)]);
        let cart = Cart::new(CartId::new("c1"), None, vec![item("p1", 1, 6000)]);

        let result = optimizer
            .optimize_cart(cart, &OptimizationContext::default())
            .await
            .expect("optimize");

        assert!(result
            .time_limited_offers
            .iter()
            .any(|offer| offer.kind == crate::optimizer::types::OfferKind::CartValueBonus));
    }

    #[tokio::test]
    async fn matching_rules_are_applied_and_recorded() {
        let optimizer = optimizer_with_catalog(vec![
            product("p1", "misc", 3000, 5),
            product("gift", "misc", 500, 5),
        ]);
        let cart = Cart::new(
            CartId::new("c1"),
            Some(CustomerId::new("cust")),
            vec![item("p1", 1, 3000)],
        );

        let context = OptimizationContext {
            rules: vec![
                OptimizationRule {
                    name: "suggest-gift-over-25".to_string(),
                    condition: RuleCondition::CartValueAtLeast(Decimal::new(2500, 2)),
                    action: RuleAction::SuggestProduct(ProductId::new("gift")),
                },
                OptimizationRule {
                    name: "never-fires".to_string(),
                    condition: RuleCondition::ItemCountAtLeast(10),
                    action: RuleAction::ShowMessage("unused".to_string()),
                },
            ],
            acceptance: None,
        };

        let result = optimizer.optimize_cart(cart, &context).await.expect("optimize");

        assert_eq!(result.applied_rules, vec!["suggest-gift-over-25".to_string()]);
        assert!(result
            .cross_sells
            .iter()
            .any(|suggestion| suggestion.product_id == ProductId::new("gift")));
        assert!(result.messages.is_empty());
    }

    #[tokio::test]
    async fn discount_rules_scale_the_predicted_final_value() {
        let optimizer = optimizer_with_catalog(vec![product("p1", "misc", 3000, 5)]);
        let cart = Cart::new(CartId::new("c1"), None, vec![item("p1", 1, 3000)]);

        let baseline = optimizer
            .optimize_cart(cart.clone(), &OptimizationContext::default())
            .await
            .expect("optimize");

        let context = OptimizationContext {
            rules: vec![OptimizationRule {
                name: "ten-off-over-25".to_string(),
                condition: RuleCondition::CartValueAtLeast(Decimal::new(2500, 2)),
                action: RuleAction::ApplyDiscountPct(0.10),
            }],
            acceptance: None,
        };
        let discounted = optimizer.optimize_cart(cart, &context).await.expect("optimize");

        assert_eq!(discounted.applied_rules, vec!["ten-off-over-25".to_string()]);
        assert!(discounted.predicted_final_value < baseline.predicted_final_value);
        assert_eq!(
            discounted.predicted_final_value,
            baseline.predicted_final_value * super::decimal_from(1.0 - 0.10)
        );
    }
}
