use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quantity tier at which a volume discount unlocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeTier {
    pub min_quantity: u32,
    pub discount_pct: f64,
}

/// Catalog product as supplied by the product catalog source.
///
/// Carries the attributes the content model builds feature vectors from
/// (category, brand, price bucket, tags, color, size) plus the inventory
/// signals the cart optimizer needs (stock, volume tiers, flash sales).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub brand: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub tags: Vec<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub volume_tiers: Vec<VolumeTier>,
    pub flash_sale_ends_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
