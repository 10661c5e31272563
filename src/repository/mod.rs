use async_trait::async_trait;

use crate::domain::order::OrderTransitions;

mod memory;

pub use memory::InMemoryOrderRepository;

// ============================================================================
// Order Repository Port
// ============================================================================
//
// Implemented by the persistence layer. The event dispatcher fetches a fresh
// copy per event, mutates it and writes it back; no multi-aggregate
// transaction is expected.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    #[error("Order {0} does not exist")]
    NotFound(String),

    #[error("Order store failure: {0}")]
    Storage(String),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    type Order: OrderTransitions + Send;

    async fn find(&self, order_id: &str) -> Result<Option<Self::Order>, RepositoryError>;

    async fn update(&self, order: Self::Order) -> Result<(), RepositoryError>;
}
