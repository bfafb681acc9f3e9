//! Read interfaces onto the external order, catalog, and event stores.
//!
//! The engine never talks to persistence directly; collaborators implement
//! these traits. The in-memory implementations back the CLI fixtures and
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Order, OrderFilters, Product, ProductId, SessionEvent, SessionId};
use crate::errors::EngineResult;

/// Order history, feeding training and affinity mining.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn list_orders(&self, filters: &OrderFilters) -> EngineResult<Vec<Order>>;
}

/// Product catalog, feeding feature vectors, pricing, and stock checks.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_products(&self) -> EngineResult<Vec<Product>>;
    async fn find_product(&self, product_id: &ProductId) -> EngineResult<Option<Product>>;
}

/// Per-session browse events, feeding session-based prediction.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn session_events(&self, session_id: &SessionId) -> EngineResult<Vec<SessionEvent>>;
}

#[derive(Default)]
pub struct InMemoryOrderSource {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderSource {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders: RwLock::new(orders) }
    }

    pub async fn push(&self, order: Order) {
        self.orders.write().await.push(order);
    }
}

#[async_trait]
impl OrderSource for InMemoryOrderSource {
    async fn list_orders(&self, filters: &OrderFilters) -> EngineResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|order| {
                filters
                    .customer_id
                    .as_ref()
                    .map(|customer| &order.customer_id == customer)
                    .unwrap_or(true)
                    && filters.since.map(|since| order.created_at >= since).unwrap_or(true)
                    && filters.until.map(|until| order.created_at < until).unwrap_or(true)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryCatalogSource {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryCatalogSource {
    pub fn new(products: Vec<Product>) -> Self {
        let products = products.into_iter().map(|product| (product.id.clone(), product)).collect();
        Self { products: RwLock::new(products) }
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalogSource {
    async fn list_products(&self) -> EngineResult<Vec<Product>> {
        let products = self.products.read().await;
        let mut listed: Vec<Product> = products.values().cloned().collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listed)
    }

    async fn find_product(&self, product_id: &ProductId) -> EngineResult<Option<Product>> {
        Ok(self.products.read().await.get(product_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryEventSource {
    events: RwLock<HashMap<SessionId, Vec<SessionEvent>>>,
}

impl InMemoryEventSource {
    pub fn new(events: HashMap<SessionId, Vec<SessionEvent>>) -> Self {
        Self { events: RwLock::new(events) }
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn session_events(&self, session_id: &SessionId) -> EngineResult<Vec<SessionEvent>> {
        let events = self.events.read().await;
        let mut listed = events.get(session_id).cloned().unwrap_or_default();
        listed.sort_by_key(|event| event.timestamp);
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{InMemoryOrderSource, OrderSource};
    use crate::domain::{CustomerId, Order, OrderFilters, OrderId, OrderLine, ProductId};

    fn order(id: &str, customer: &str, days_ago: i64) -> Order {
        Order {
            id: OrderId(id.to_string()),
            customer_id: CustomerId::new(customer),
            lines: vec![OrderLine {
                product_id: ProductId::new("p-1"),
                quantity: 1,
                unit_price: Decimal::ONE,
            }],
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn order_filters_restrict_by_customer_and_time() {
        let source = InMemoryOrderSource::new(vec![
            order("o1", "c1", 10),
            order("o2", "c1", 1),
            order("o3", "c2", 1),
        ]);

        let filters = OrderFilters {
            customer_id: Some(CustomerId::new("c1")),
            since: Some(Utc::now() - Duration::days(5)),
            until: None,
        };
        let orders = source.list_orders(&filters).await.expect("list orders");

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id.0, "o2");
    }
}
