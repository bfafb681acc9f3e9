//! Shared engine state: snapshot-swapped training artifacts, concurrent
//! performance counters, the active/abandoned cart registry, and the
//! TTL-bounded recommendation response log.
//!
//! Readers clone an `Arc` to the current snapshot and never observe a
//! partially rebuilt index; training jobs build a full replacement off to
//! the side and swap it in under a short write lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::affinity::AffinityModel;
use crate::config::EngineConfig;
use crate::domain::{Cart, CartId, CartStatus, CustomerId, Product, ProductId};
use crate::errors::{EngineError, EngineResult};
use crate::similarity::SimilarityIndex;

/// Immutable artifact of one collaborative + content training pass.
#[derive(Clone, Debug, Default)]
pub struct TrainingSnapshot {
    /// Sparse per-user rating vectors (product -> rating).
    pub user_vectors: HashMap<CustomerId, HashMap<ProductId, f64>>,
    /// Sparse per-product feature vectors (feature key -> weight).
    pub feature_vectors: HashMap<ProductId, HashMap<String, f64>>,
    /// Catalog as of the last content training pass.
    pub catalog: HashMap<ProductId, Product>,
    pub similarity: SimilarityIndex,
    /// Purchase counts backing the popularity fallback.
    pub purchase_counts: HashMap<ProductId, u64>,
    pub trained_at: Option<DateTime<Utc>>,
}

impl TrainingSnapshot {
    /// Products ranked by purchase count, most popular first.
    pub fn popularity_ranking(&self) -> Vec<(ProductId, u64)> {
        let mut ranking: Vec<(ProductId, u64)> =
            self.purchase_counts.iter().map(|(id, count)| (id.clone(), *count)).collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranking
    }
}

/// Plain-value view of one product's accumulated performance counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    /// Accumulated revenue in cents.
    pub revenue_cents: u64,
}

impl PerformanceMetrics {
    /// Beta-distribution parameters for Thompson sampling.
    pub fn beta_params(&self) -> (f64, f64) {
        let alpha = self.conversions as f64 + 1.0;
        let beta = self.impressions.saturating_sub(self.conversions) as f64 + 1.0;
        (alpha, beta)
    }

    pub fn revenue(&self) -> Decimal {
        Decimal::new(self.revenue_cents as i64, 2)
    }
}

#[derive(Debug, Default)]
struct ProductCounters {
    impressions: AtomicU64,
    clicks: AtomicU64,
    conversions: AtomicU64,
    revenue_cents: AtomicU64,
}

/// Write-heavy impression/click/conversion counters.
///
/// Increments are lock-free once a product's slot exists; the outer lock is
/// only taken for writing when a product is seen for the first time.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    counters: RwLock<HashMap<ProductId, Arc<ProductCounters>>>,
}

impl PerformanceTracker {
    fn slot(&self, product_id: &ProductId) -> Arc<ProductCounters> {
        if let Some(slot) = self.counters.read().get(product_id) {
            return Arc::clone(slot);
        }
        Arc::clone(
            self.counters
                .write()
                .entry(product_id.clone())
                .or_insert_with(|| Arc::new(ProductCounters::default())),
        )
    }

    pub fn record_impression(&self, product_id: &ProductId) {
        self.slot(product_id).impressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_click(&self, product_id: &ProductId) {
        self.slot(product_id).clicks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversion(&self, product_id: &ProductId, revenue: Decimal) {
        let slot = self.slot(product_id);
        slot.conversions.fetch_add(1, Ordering::Relaxed);
        let cents = (revenue * Decimal::from(100)).trunc().to_u64().unwrap_or(0);
        slot.revenue_cents.fetch_add(cents, Ordering::Relaxed);
    }

    pub fn metrics(&self, product_id: &ProductId) -> PerformanceMetrics {
        self.counters
            .read()
            .get(product_id)
            .map(|slot| PerformanceMetrics {
                impressions: slot.impressions.load(Ordering::Relaxed),
                clicks: slot.clicks.load(Ordering::Relaxed),
                conversions: slot.conversions.load(Ordering::Relaxed),
                revenue_cents: slot.revenue_cents.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<ProductId, PerformanceMetrics> {
        self.counters
            .read()
            .iter()
            .map(|(id, slot)| {
                (
                    id.clone(),
                    PerformanceMetrics {
                        impressions: slot.impressions.load(Ordering::Relaxed),
                        clicks: slot.clicks.load(Ordering::Relaxed),
                        conversions: slot.conversions.load(Ordering::Relaxed),
                        revenue_cents: slot.revenue_cents.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }

    /// Seed counters with known metrics, used by fixtures and tests.
    pub fn seed(&self, product_id: &ProductId, metrics: PerformanceMetrics) {
        let slot = self.slot(product_id);
        slot.impressions.store(metrics.impressions, Ordering::Relaxed);
        slot.clicks.store(metrics.clicks, Ordering::Relaxed);
        slot.conversions.store(metrics.conversions, Ordering::Relaxed);
        slot.revenue_cents.store(metrics.revenue_cents, Ordering::Relaxed);
    }
}

/// Analytics record kept for each served recommendation response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggedResponse {
    pub id: String,
    pub strategy: String,
    pub customer_id: Option<CustomerId>,
    pub recommendation_count: usize,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Single-instance engine state handle shared by every component.
pub struct EngineState {
    pub config: EngineConfig,
    training: RwLock<Arc<TrainingSnapshot>>,
    affinity: RwLock<Arc<AffinityModel>>,
    pub performance: PerformanceTracker,
    carts: RwLock<HashMap<CartId, Cart>>,
    responses: RwLock<Vec<LoggedResponse>>,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            training: RwLock::new(Arc::new(TrainingSnapshot::default())),
            affinity: RwLock::new(Arc::new(AffinityModel::default())),
            performance: PerformanceTracker::default(),
            carts: RwLock::new(HashMap::new()),
            responses: RwLock::new(Vec::new()),
        }
    }

    /// Current training snapshot; cheap to clone, safe to hold across a
    /// concurrent retrain.
    pub fn training(&self) -> Arc<TrainingSnapshot> {
        Arc::clone(&self.training.read())
    }

    pub fn install_training(&self, snapshot: TrainingSnapshot) {
        *self.training.write() = Arc::new(snapshot);
    }

    pub fn affinity(&self) -> Arc<AffinityModel> {
        Arc::clone(&self.affinity.read())
    }

    pub fn install_affinity(&self, model: AffinityModel) {
        *self.affinity.write() = Arc::new(model);
    }

    // ------------------------------------------------------------------
    // Cart registry
    // ------------------------------------------------------------------

    pub fn upsert_cart(&self, cart: Cart) {
        self.carts.write().insert(cart.id.clone(), cart);
    }

    pub fn cart(&self, cart_id: &CartId) -> EngineResult<Cart> {
        self.carts
            .read()
            .get(cart_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("cart", cart_id.0.clone()))
    }

    /// Apply a mutation to a registered cart, returning the updated copy.
    pub fn update_cart(
        &self,
        cart_id: &CartId,
        update: impl FnOnce(&mut Cart),
    ) -> EngineResult<Cart> {
        let mut carts = self.carts.write();
        let cart = carts
            .get_mut(cart_id)
            .ok_or_else(|| EngineError::not_found("cart", cart_id.0.clone()))?;
        update(cart);
        Ok(cart.clone())
    }

    /// Transition idle active carts to abandoned. Returns the ids affected.
    pub fn sweep_abandoned(&self, now: DateTime<Utc>) -> Vec<CartId> {
        let idle_window = Duration::minutes(self.config.optimizer.abandonment_idle_minutes);
        let mut swept = Vec::new();

        for cart in self.carts.write().values_mut() {
            if cart.status == CartStatus::Active && cart.is_abandoned(now, idle_window) {
                cart.status = CartStatus::Abandoned;
                swept.push(cart.id.clone());
            }
        }

        swept
    }

    // ------------------------------------------------------------------
    // Recommendation response log
    // ------------------------------------------------------------------

    pub fn log_response(&self, entry: LoggedResponse) {
        self.responses.write().push(entry);
    }

    /// Drop expired log entries and return how many remain.
    pub fn prune_responses(&self, now: DateTime<Utc>) -> usize {
        let mut responses = self.responses.write();
        responses.retain(|entry| entry.expires_at > now);
        responses.len()
    }

    pub fn logged_responses(&self) -> Vec<LoggedResponse> {
        self.responses.read().clone()
    }
}
