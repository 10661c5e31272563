//! Event-ingestion core of the order command service.
//!
//! Consumes order events published by other services (voyage assignment,
//! cancellation, container allocation, spoilage), decodes the tagged-union
//! wire payload and applies each event to its shipping order through the
//! repository port.

pub mod config;
pub mod consumer;
pub mod domain;
pub mod events;
pub mod messaging;
pub mod metrics;
pub mod repository;

#[cfg(test)]
mod test_support;
