use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::order::ShippingOrder;
use super::{OrderRepository, RepositoryError};

/// In-memory order store.
///
/// Used by the binary when no external store is wired in, and by tests.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<String, ShippingOrder>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an order, as the command-side write path would.
    pub async fn save(&self, order: ShippingOrder) {
        self.orders.write().await.insert(order.order_id.clone(), order);
    }

    pub async fn get(&self, order_id: &str) -> Option<ShippingOrder> {
        self.orders.read().await.get(order_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    type Order = ShippingOrder;

    async fn find(&self, order_id: &str) -> Result<Option<ShippingOrder>, RepositoryError> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn update(&self, order: ShippingOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.order_id) {
            Some(existing) => {
                *existing = order;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(order.order_id)),
        }
    }
}
