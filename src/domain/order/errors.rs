use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Order is already spoilt")]
    AlreadySpoilt,

    #[error("Cannot {action} an order in status: {status}")]
    InvalidStatusTransition {
        action: &'static str,
        status: OrderStatus,
    },

    #[error("Order identifier mismatch: aggregate {aggregate}, payload {payload}")]
    OrderIdMismatch { aggregate: String, payload: String },
}
