use serde::{Deserialize, Serialize};

use crate::events::{Envelope, EventType};
use super::value_objects::Address;

// ============================================================================
// Order Events - Payloads carried on the orders channel
// ============================================================================

/// Order Event - union of every envelope the orders channel may carry
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Created(Envelope<OrderPayload>),
    Updated(Envelope<OrderPayload>),
    VoyageAssigned(Envelope<VoyageAssignmentPayload>),
    Cancelled(Envelope<CancellationPayload>),
    ContainerAllocated(Envelope<ContainerAssignmentPayload>),
    Spoilt(Envelope<OrderSpoiltPayload>),
}

impl OrderEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            OrderEvent::Created(_) => EventType::OrderCreated,
            OrderEvent::Updated(_) => EventType::OrderUpdated,
            OrderEvent::VoyageAssigned(_) => EventType::VoyageAssigned,
            OrderEvent::Cancelled(_) => EventType::OrderCancelled,
            OrderEvent::ContainerAllocated(_) => EventType::ContainerAllocated,
            OrderEvent::Spoilt(_) => EventType::OrderSpoilt,
        }
    }

    /// Identifier of the order the event is about.
    pub fn order_id(&self) -> &str {
        match self {
            OrderEvent::Created(e) | OrderEvent::Updated(e) => &e.payload.order_id,
            OrderEvent::VoyageAssigned(e) => &e.payload.order_id,
            OrderEvent::Cancelled(e) => &e.payload.order_id,
            OrderEvent::ContainerAllocated(e) => &e.payload.order_id,
            OrderEvent::Spoilt(e) => &e.payload.order_id,
        }
    }

    /// Creation and update events are consumed by other services; this
    /// agent decodes them but never applies a transition for them.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, OrderEvent::Created(_) | OrderEvent::Updated(_))
    }
}

// ============================================================================
// Individual Payload Types
// ============================================================================

/// Full order snapshot carried by OrderCreated / OrderUpdated
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderPayload {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "productID", default)]
    pub product_id: String,
    #[serde(rename = "customerID", default)]
    pub customer_id: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(rename = "pickupAddress", default, skip_serializing_if = "Option::is_none")]
    pub pickup_address: Option<Address>,
    #[serde(rename = "pickupDate", default, skip_serializing_if = "Option::is_none")]
    pub pickup_date: Option<String>,
    #[serde(rename = "destinationAddress", default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<Address>,
    #[serde(rename = "expectedDeliveryDate", default, skip_serializing_if = "Option::is_none")]
    pub expected_delivery_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Voyage Assigned - a vessel voyage now carries the order
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoyageAssignmentPayload {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "voyageID")]
    pub voyage_id: String,
    #[serde(rename = "assignedAt", default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<String>,
}

/// Order Cancelled
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CancellationPayload {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "customerID", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(rename = "cancelledAt", default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
}

/// Container Allocated - a reefer container was reserved for the order
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContainerAssignmentPayload {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "containerID")]
    pub container_id: String,
    #[serde(rename = "allocatedAt", default, skip_serializing_if = "Option::is_none")]
    pub allocated_at: Option<String>,
}

/// Order Spoilt - the goods were lost to a cold-chain failure
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderSpoiltPayload {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "containerID", default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(rename = "spoilageDate", default, skip_serializing_if = "Option::is_none")]
    pub spoilage_date: Option<String>,
}
