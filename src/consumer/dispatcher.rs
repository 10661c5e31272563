use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::domain::order::{OrderError, OrderEvent, OrderTransitions};
use crate::events::EventType;
use crate::metrics::Metrics;
use crate::repository::{OrderRepository, RepositoryError};

// ============================================================================
// Order Event Dispatcher
// ============================================================================
//
// Orchestrates: OrderEvent → fetch order → transition → persist
//
// Every fetch-mutate-persist cycle runs under one update guard, so two
// cycles against the same repository never interleave. The guard can be
// shared with any other writer of that repository (e.g. a command path).
//
// ============================================================================

/// Successful dispatch outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    /// The order was transitioned and written back
    Applied { order_id: String, event_type: EventType },
    /// Creation/update snapshots carry no transition for this agent
    NoAction { event_type: EventType },
}

impl Ack {
    pub fn label(&self) -> &'static str {
        match self {
            Ack::Applied { .. } => "applied",
            Ack::NoAction { .. } => "no_action",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Cannot update - Unknown order Id {0}")]
    UnknownOrder(String),

    #[error("Order {order_id} rejected {event_type}: {source}")]
    Rejected {
        order_id: String,
        event_type: EventType,
        #[source]
        source: OrderError,
    },

    #[error("Order store failed for {order_id}: {source}")]
    Repository {
        order_id: String,
        #[source]
        source: RepositoryError,
    },
}

impl DispatchError {
    /// Short label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            DispatchError::UnknownOrder(_) => "unknown_order",
            DispatchError::Rejected { .. } => "rejected",
            DispatchError::Repository { .. } => "repository",
        }
    }

    /// Only store failures may succeed on a later delivery of the same event
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Repository { .. })
    }
}

pub struct OrderEventDispatcher<R: OrderRepository> {
    repository: Arc<R>,
    update_guard: Arc<Mutex<()>>,
    metrics: Option<Arc<Metrics>>,
}

impl<R: OrderRepository> OrderEventDispatcher<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            update_guard: Arc::new(Mutex::new(())),
            metrics: None,
        }
    }

    /// Use a guard shared with other writers of the same repository
    pub fn with_update_guard(mut self, guard: Arc<Mutex<()>>) -> Self {
        self.update_guard = guard;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply one decoded event.
    ///
    /// Failures are logged here and returned for classification; they are
    /// never retried by the dispatcher.
    pub async fn apply(&self, event: &OrderEvent) -> Result<Ack, DispatchError> {
        let started = Instant::now();
        let event_type = event.event_type();
        let result = self.dispatch(event).await;

        match &result {
            Ok(Ack::Applied { order_id, .. }) => {
                tracing::info!(
                    order_id = %order_id,
                    event_type = %event_type,
                    "✅ Applied order event"
                );
            }
            Ok(Ack::NoAction { .. }) => {
                tracing::debug!(
                    order_id = %event.order_id(),
                    event_type = %event_type,
                    "Order snapshot event, nothing to apply"
                );
            }
            Err(e @ DispatchError::Rejected { .. }) => {
                tracing::warn!(
                    error = %e,
                    order_id = %event.order_id(),
                    event_type = %event_type,
                    "Order rejected transition, event dropped"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    reason = e.reason(),
                    order_id = %event.order_id(),
                    event_type = %event_type,
                    "❌ Failed to apply order event, event dropped"
                );
            }
        }

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(ack) => Ok(ack.label()),
                Err(e) => Err(e.reason()),
            };
            metrics.record_dispatch(event_type.as_str(), started.elapsed().as_secs_f64(), outcome);
        }

        result
    }

    async fn dispatch(&self, event: &OrderEvent) -> Result<Ack, DispatchError> {
        let event_type = event.event_type();

        match event {
            OrderEvent::Created(_) | OrderEvent::Updated(_) => Ok(Ack::NoAction { event_type }),
            OrderEvent::VoyageAssigned(e) => {
                self.transition(event_type, &e.payload.order_id, |order| order.assign_voyage(&e.payload))
                    .await
            }
            OrderEvent::Cancelled(e) => {
                self.transition(event_type, &e.payload.order_id, |order| order.cancel(&e.payload))
                    .await
            }
            OrderEvent::ContainerAllocated(e) => {
                self.transition(event_type, &e.payload.order_id, |order| order.assign_container(&e.payload))
                    .await
            }
            OrderEvent::Spoilt(e) => {
                self.transition(event_type, &e.payload.order_id, |order| order.mark_spoilt())
                    .await
            }
        }
    }

    async fn transition<F>(&self, event_type: EventType, order_id: &str, apply: F) -> Result<Ack, DispatchError>
    where
        F: FnOnce(&mut R::Order) -> Result<(), OrderError>,
    {
        let _guard = self.update_guard.lock().await;

        let mut order = self
            .repository
            .find(order_id)
            .await
            .map_err(|source| DispatchError::Repository {
                order_id: order_id.to_string(),
                source,
            })?
            .ok_or_else(|| DispatchError::UnknownOrder(order_id.to_string()))?;

        apply(&mut order).map_err(|source| DispatchError::Rejected {
            order_id: order.order_id().to_string(),
            event_type,
            source,
        })?;

        self.repository
            .update(order)
            .await
            .map_err(|source| DispatchError::Repository {
                order_id: order_id.to_string(),
                source,
            })?;

        Ok(Ack::Applied {
            order_id: order_id.to_string(),
            event_type,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
