use serde::Serialize;

use crate::domain::order::OrderEvent;
use super::envelope::{EnvelopeHeader, EventType};

// ============================================================================
// Event Decoder - raw message body to typed OrderEvent
// ============================================================================
//
// Two passes over the same bytes:
// 1. Read only the discriminator (EnvelopeHeader), nothing else is trusted
// 2. Re-parse the whole body as the concrete envelope picked from DECODERS
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported event type: {0}")]
    UnsupportedType(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl DecodeError {
    /// Short label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::UnsupportedType(_) => "unsupported_type",
            DecodeError::MalformedPayload(_) => "malformed_payload",
        }
    }
}

type PayloadDecoder = fn(&[u8]) -> serde_json::Result<OrderEvent>;

static DECODERS: [(EventType, PayloadDecoder); 6] = [
    (EventType::OrderCreated, decode_created),
    (EventType::OrderUpdated, decode_updated),
    (EventType::VoyageAssigned, decode_voyage_assigned),
    (EventType::OrderCancelled, decode_cancelled),
    (EventType::ContainerAllocated, decode_container_allocated),
    (EventType::OrderSpoilt, decode_spoilt),
];

fn decode_created(raw: &[u8]) -> serde_json::Result<OrderEvent> {
    serde_json::from_slice(raw).map(OrderEvent::Created)
}

fn decode_updated(raw: &[u8]) -> serde_json::Result<OrderEvent> {
    serde_json::from_slice(raw).map(OrderEvent::Updated)
}

fn decode_voyage_assigned(raw: &[u8]) -> serde_json::Result<OrderEvent> {
    serde_json::from_slice(raw).map(OrderEvent::VoyageAssigned)
}

fn decode_cancelled(raw: &[u8]) -> serde_json::Result<OrderEvent> {
    serde_json::from_slice(raw).map(OrderEvent::Cancelled)
}

fn decode_container_allocated(raw: &[u8]) -> serde_json::Result<OrderEvent> {
    serde_json::from_slice(raw).map(OrderEvent::ContainerAllocated)
}

fn decode_spoilt(raw: &[u8]) -> serde_json::Result<OrderEvent> {
    serde_json::from_slice(raw).map(OrderEvent::Spoilt)
}

/// Decode a raw message body into a typed order event
pub fn decode(raw: &[u8]) -> Result<OrderEvent, DecodeError> {
    let header: EnvelopeHeader = serde_json::from_slice(raw)
        .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let discriminator = header
        .event_type
        .ok_or_else(|| DecodeError::MalformedPayload("missing event type".to_string()))?;

    let event_type = EventType::from_discriminator(&discriminator)
        .ok_or(DecodeError::UnsupportedType(discriminator))?;

    let (_, decoder) = DECODERS
        .iter()
        .find(|(candidate, _)| *candidate == event_type)
        .ok_or_else(|| DecodeError::UnsupportedType(event_type.to_string()))?;

    decoder(raw).map_err(|e| DecodeError::MalformedPayload(format!("{}: {}", event_type, e)))
}

/// Encode an order event to its wire JSON
pub fn encode(event: &OrderEvent) -> serde_json::Result<String> {
    fn to_json<P: Serialize>(envelope: &P) -> serde_json::Result<String> {
        serde_json::to_string(envelope)
    }

    match event {
        OrderEvent::Created(e) | OrderEvent::Updated(e) => to_json(e),
        OrderEvent::VoyageAssigned(e) => to_json(e),
        OrderEvent::Cancelled(e) => to_json(e),
        OrderEvent::ContainerAllocated(e) => to_json(e),
        OrderEvent::Spoilt(e) => to_json(e),
    }
}

// ============================================================================
// Tests
// ============================================================================
