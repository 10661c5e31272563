// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Shipping order aggregate, its value objects and the event payloads that
// other services publish about it. Nothing here knows about Kafka.
//
// ============================================================================

pub mod order;
