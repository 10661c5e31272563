use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

// ============================================================================
// Event Envelope - Wire shape shared by every order event
// ============================================================================
//
// {"timestamp": 1700000000000, "type": "VoyageAssigned", "version": "1",
//  "payload": {...}}
//
// The discriminator field name and the values below are the compatibility
// contract with producers.
//
// ============================================================================

/// Discriminator of an order event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    OrderCreated,
    OrderUpdated,
    VoyageAssigned,
    OrderCancelled,
    ContainerAllocated,
    OrderSpoilt,
}

const DISCRIMINATORS: [(&str, EventType); 6] = [
    ("OrderCreated", EventType::OrderCreated),
    ("OrderUpdated", EventType::OrderUpdated),
    ("VoyageAssigned", EventType::VoyageAssigned),
    ("OrderCancelled", EventType::OrderCancelled),
    ("ContainerAllocated", EventType::ContainerAllocated),
    ("OrderSpoilt", EventType::OrderSpoilt),
];

impl EventType {
    /// Resolve a wire discriminator; `None` for anything outside the known set.
    pub fn from_discriminator(value: &str) -> Option<Self> {
        DISCRIMINATORS
            .iter()
            .find(|(discriminator, _)| *discriminator == value)
            .map(|(_, event_type)| *event_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "OrderCreated",
            EventType::OrderUpdated => "OrderUpdated",
            EventType::VoyageAssigned => "VoyageAssigned",
            EventType::OrderCancelled => "OrderCancelled",
            EventType::ContainerAllocated => "ContainerAllocated",
            EventType::OrderSpoilt => "OrderSpoilt",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic Event Envelope - wraps a typed payload with the common fields
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Envelope<P> {
    /// Epoch milliseconds set by the producer
    #[serde(default)]
    pub timestamp: i64,

    #[serde(rename = "type")]
    pub event_type: EventType,

    #[serde(default = "default_version")]
    pub version: String,

    pub payload: P,
}

fn default_version() -> String {
    "1".to_string()
}

impl<P> Envelope<P> {
    pub fn new(event_type: EventType, payload: P) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            event_type,
            version: default_version(),
            payload,
        }
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// First-pass view of a message: only the discriminator is read, the rest
/// of the body is ignored until the concrete shape is known.
#[derive(Deserialize, Debug)]
pub(crate) struct EnvelopeHeader {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
}
