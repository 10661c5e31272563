// ============================================================================
// Order Domain - Shipping orders driven by events from other services
// ============================================================================
//
// Order-specific code:
// - Value objects (Address, OrderStatus)
// - Event payloads (VoyageAssigned, OrderCancelled, etc.)
// - Errors (OrderError enum)
// - Aggregate (ShippingOrder and the OrderTransitions port)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use errors::*;
pub use aggregate::*;
