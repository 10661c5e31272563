//! Test doubles shared by the dispatcher and consumption loop tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::consumer::AgentHandle;
use crate::domain::order::ShippingOrder;
use crate::messaging::{MessageSource, RawMessage, SourceError};
use crate::repository::{InMemoryOrderRepository, OrderRepository, RepositoryError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RepositoryCall {
    Find(String),
    Update(String),
}

/// In-memory repository that records every call made through the port
#[derive(Clone, Default)]
pub(crate) struct RecordingRepository {
    inner: InMemoryOrderRepository,
    calls: Arc<Mutex<Vec<RepositoryCall>>>,
    find_delay: Arc<Mutex<Option<Duration>>>,
    fail_updates_after: Arc<Mutex<Option<usize>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl RecordingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an order without recording a call
    pub async fn seed(&self, order: ShippingOrder) {
        self.inner.save(order).await;
    }

    pub async fn stored(&self, order_id: &str) -> Option<ShippingOrder> {
        self.inner.get(order_id).await
    }

    pub fn calls(&self) -> Vec<RepositoryCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn find_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RepositoryCall::Find(_)))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RepositoryCall::Update(_)))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_find_delay(&self, delay: Duration) {
        *self.find_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_updates(&self, fail: bool) {
        *self.fail_updates_after.lock().unwrap() = fail.then_some(0);
    }

    /// Let `successes` more updates through, then fail every update
    pub fn fail_updates_after(&self, successes: usize) {
        *self.fail_updates_after.lock().unwrap() = Some(self.update_count() + successes);
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderRepository for RecordingRepository {
    type Order = ShippingOrder;

    async fn find(&self, order_id: &str) -> Result<Option<ShippingOrder>, RepositoryError> {
        self.enter();
        self.calls.lock().unwrap().push(RepositoryCall::Find(order_id.to_string()));

        let delay = *self.find_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.inner.find(order_id).await;
        self.leave();
        result
    }

    async fn update(&self, order: ShippingOrder) -> Result<(), RepositoryError> {
        self.enter();
        let previous_updates = self.update_count();
        self.calls.lock().unwrap().push(RepositoryCall::Update(order.order_id.clone()));

        let fail_after = *self.fail_updates_after.lock().unwrap();
        let result = match fail_after {
            Some(limit) if previous_updates >= limit => {
                Err(RepositoryError::Unavailable("injected failure".to_string()))
            }
            _ => self.inner.update(order).await,
        };
        self.leave();
        result
    }
}

#[derive(Default)]
struct ScriptState {
    batches: VecDeque<Vec<RawMessage>>,
    delivered: Vec<RawMessage>,
    committed: Vec<i64>,
    seeks: Vec<(i32, i64)>,
    fail_next_poll: bool,
    fail_close: bool,
    closed: bool,
    stop_when_drained: Option<AgentHandle>,
}

/// Message source replaying pre-built batches, one per poll.
///
/// A seek queues the already delivered messages of that partition, from the
/// seek offset on, as the next batch.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSource {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<RawMessage>>) -> Self {
        let source = Self::default();
        source.state.lock().unwrap().batches = batches.into();
        source
    }

    /// Clear the agent's liveness flag once every batch has been handed out
    pub fn stop_when_drained(&self, handle: AgentHandle) {
        self.state.lock().unwrap().stop_when_drained = Some(handle);
    }

    pub fn fail_next_poll(&self) {
        self.state.lock().unwrap().fail_next_poll = true;
    }

    pub fn fail_close(&self) {
        self.state.lock().unwrap().fail_close = true;
    }

    pub fn committed(&self) -> Vec<i64> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn seeks(&self) -> Vec<(i32, i64)> {
        self.state.lock().unwrap().seeks.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn poll(&mut self, _timeout: Duration) -> Result<Vec<RawMessage>, SourceError> {
        let mut state = self.state.lock().unwrap();

        if state.closed {
            return Err(SourceError::Closed);
        }
        if state.fail_next_poll {
            state.fail_next_poll = false;
            return Err(SourceError::Shutdown("injected poll failure".to_string()));
        }

        match state.batches.pop_front() {
            Some(batch) => {
                state.delivered.extend(batch.iter().cloned());
                Ok(batch)
            }
            None => {
                if let Some(handle) = &state.stop_when_drained {
                    handle.stop();
                }
                Ok(Vec::new())
            }
        }
    }

    async fn commit(&mut self, message: &RawMessage) -> Result<(), SourceError> {
        self.state.lock().unwrap().committed.push(message.offset);
        Ok(())
    }

    async fn seek(&mut self, message: &RawMessage) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        state.seeks.push((message.partition, message.offset));

        let mut replay: Vec<RawMessage> = state
            .delivered
            .iter()
            .filter(|m| m.topic == message.topic && m.partition == message.partition && m.offset >= message.offset)
            .cloned()
            .collect();
        replay.sort_by_key(|m| m.offset);
        replay.dedup_by_key(|m| m.offset);

        state.batches.push_front(replay);
        Ok(())
    }

    async fn close(&mut self, timeout: Duration) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_close {
            return Err(SourceError::CloseTimedOut(timeout));
        }
        state.closed = true;
        Ok(())
    }
}
