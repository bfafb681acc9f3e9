use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::CustomerId;
use crate::domain::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartId(pub String);

impl CartId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartStatus {
    Active,
    Abandoned,
}

/// One recovery outreach recorded against an abandoned cart.
///
/// Attempts are append-only; earlier attempts are never overwritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub attempted_at: DateTime<Utc>,
    pub strategy: String,
    pub estimated_probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<CartItem>,
    pub status: CartStatus,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub optimization_attempts: u32,
    #[serde(default)]
    pub recovery_attempts: Vec<RecoveryAttempt>,
}

impl Cart {
    pub fn new(id: CartId, customer_id: Option<CustomerId>, items: Vec<CartItem>) -> Self {
        Self {
            id,
            customer_id,
            items,
            status: CartStatus::Active,
            last_updated: Utc::now(),
            optimization_attempts: 0,
            recovery_attempts: Vec::new(),
        }
    }

    /// Cart value, always recomputed from the items, never cached.
    pub fn current_value(&self) -> Decimal {
        self.items.iter().map(|item| item.unit_price * Decimal::from(item.quantity)).sum()
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|item| &item.product_id == product_id)
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id.clone()).collect()
    }

    /// An active cart counts as abandoned once it has been idle for the
    /// configured window (30 minutes by default).
    pub fn is_abandoned(&self, now: DateTime<Utc>, idle_window: Duration) -> bool {
        match self.status {
            CartStatus::Abandoned => true,
            CartStatus::Active => now - self.last_updated >= idle_window,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    View,
    AddToCart,
    Purchase,
}

/// A single browse event from the event/session source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub product_id: ProductId,
    pub timestamp: DateTime<Utc>,
}
