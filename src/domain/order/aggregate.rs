use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use super::value_objects::{Address, OrderStatus};
use super::events::*;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate Port
// ============================================================================
//
// The capability set the event dispatcher invokes on a fetched order.
// Persistence-backed aggregates implement this trait; the dispatcher never
// touches aggregate fields directly.
//
// ============================================================================

pub trait OrderTransitions {
    fn order_id(&self) -> &str;

    fn assign_voyage(&mut self, assignment: &VoyageAssignmentPayload) -> Result<(), OrderError>;

    fn cancel(&mut self, cancellation: &CancellationPayload) -> Result<(), OrderError>;

    fn assign_container(&mut self, assignment: &ContainerAssignmentPayload) -> Result<(), OrderError>;

    fn mark_spoilt(&mut self) -> Result<(), OrderError>;
}

// ============================================================================
// Shipping Order - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingOrder {
    // Identity
    pub order_id: String,

    // What and for whom
    pub product_id: String,
    pub customer_id: String,
    pub quantity: i32,
    pub pickup_address: Option<Address>,
    pub pickup_date: Option<String>,
    pub destination_address: Option<Address>,
    pub expected_delivery_date: Option<String>,

    // Current State
    pub status: OrderStatus,
    pub voyage_id: Option<String>,
    pub container_id: Option<String>,
    pub cancellation_reason: Option<String>,

    // Audit Trail
    pub updated_at: DateTime<Utc>,
}

impl ShippingOrder {
    pub fn new(order_id: impl Into<String>, product_id: impl Into<String>, customer_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            order_id: order_id.into(),
            product_id: product_id.into(),
            customer_id: customer_id.into(),
            quantity,
            pickup_address: None,
            pickup_date: None,
            destination_address: None,
            expected_delivery_date: None,
            status: OrderStatus::Pending,
            voyage_id: None,
            container_id: None,
            cancellation_reason: None,
            updated_at: Utc::now(),
        }
    }

    /// Build a pending order from the snapshot carried by OrderCreated.
    pub fn from_snapshot(snapshot: &OrderPayload) -> Self {
        Self {
            pickup_address: snapshot.pickup_address.clone(),
            pickup_date: snapshot.pickup_date.clone(),
            destination_address: snapshot.destination_address.clone(),
            expected_delivery_date: snapshot.expected_delivery_date.clone(),
            ..Self::new(
                snapshot.order_id.clone(),
                snapshot.product_id.clone(),
                snapshot.customer_id.clone(),
                snapshot.quantity,
            )
        }
    }

    fn ensure_same_order(&self, payload_order_id: &str) -> Result<(), OrderError> {
        if self.order_id != payload_order_id {
            return Err(OrderError::OrderIdMismatch {
                aggregate: self.order_id.clone(),
                payload: payload_order_id.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::InvalidStatusTransition {
                action,
                status: self.status,
            });
        }
        Ok(())
    }

    fn refresh_assignment_status(&mut self) {
        self.status = match (&self.voyage_id, &self.container_id) {
            (Some(_), Some(_)) => OrderStatus::Booked,
            (None, None) => OrderStatus::Pending,
            _ => OrderStatus::Assigned,
        };
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl OrderTransitions for ShippingOrder {
    fn order_id(&self) -> &str {
        &self.order_id
    }

    fn assign_voyage(&mut self, assignment: &VoyageAssignmentPayload) -> Result<(), OrderError> {
        self.ensure_same_order(&assignment.order_id)?;
        self.ensure_open("assign a voyage to")?;

        self.voyage_id = Some(assignment.voyage_id.clone());
        self.refresh_assignment_status();
        self.touch();
        Ok(())
    }

    fn cancel(&mut self, cancellation: &CancellationPayload) -> Result<(), OrderError> {
        self.ensure_same_order(&cancellation.order_id)?;
        match self.status {
            OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
            OrderStatus::Spoilt => {
                return Err(OrderError::InvalidStatusTransition {
                    action: "cancel",
                    status: self.status,
                })
            }
            _ => {} // voyage and container are kept for the record
        }

        self.status = OrderStatus::Cancelled;
        self.cancellation_reason = Some(cancellation.reason.clone());
        self.touch();
        Ok(())
    }

    fn assign_container(&mut self, assignment: &ContainerAssignmentPayload) -> Result<(), OrderError> {
        self.ensure_same_order(&assignment.order_id)?;
        self.ensure_open("assign a container to")?;

        self.container_id = Some(assignment.container_id.clone());
        self.refresh_assignment_status();
        self.touch();
        Ok(())
    }

    fn mark_spoilt(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Spoilt => return Err(OrderError::AlreadySpoilt),
            OrderStatus::Cancelled => {
                return Err(OrderError::InvalidStatusTransition {
                    action: "spoil",
                    status: self.status,
                })
            }
            _ => {}
        }

        self.status = OrderStatus::Spoilt;
        self.touch();
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
