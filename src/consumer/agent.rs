use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{CommitPolicy, ConsumerSettings};
use crate::domain::order::OrderEvent;
use crate::events::{decode, DecodeError};
use crate::messaging::{MessageSource, RawMessage, SourceError};
use crate::metrics::Metrics;
use crate::repository::OrderRepository;
use super::dispatcher::{Ack, DispatchError, OrderEventDispatcher};

// ============================================================================
// Order Event Agent - Consumption Loop
// ============================================================================
//
// One worker drives: poll → decode → dispatch, one message at a time, in
// arrival order. Nothing that happens to a single message stops the loop;
// only the liveness flag does.
//
// ============================================================================

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Liveness flag shared with the owning process
#[derive(Clone, Debug)]
pub struct AgentHandle {
    running: Arc<AtomicBool>,
}

impl AgentHandle {
    pub(crate) fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the loop to stop after the current poll cycle
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Order event agent stop requested");
        }
    }
}

/// What happened to a single message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Dispatched(Ack),
    Undecodable(DecodeError),
    Dropped(DispatchError),
}

impl MessageOutcome {
    /// Settled messages are never worth redelivering
    pub fn is_settled(&self) -> bool {
        match self {
            MessageOutcome::Dispatched(_) | MessageOutcome::Undecodable(_) => true,
            MessageOutcome::Dropped(e) => !e.is_transient(),
        }
    }
}

/// Tally of one poll cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub received: usize,
    pub applied: usize,
    pub no_action: usize,
    pub decode_failures: usize,
    pub dispatch_failures: usize,
    /// Left for redelivery behind a rewound message of the same partition
    pub deferred: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Dispatched(Ack::Applied { .. }) => self.applied += 1,
            MessageOutcome::Dispatched(Ack::NoAction { .. }) => self.no_action += 1,
            MessageOutcome::Undecodable(_) => self.decode_failures += 1,
            MessageOutcome::Dropped(_) => self.dispatch_failures += 1,
        }
    }
}

pub struct OrderEventAgent<S: MessageSource, R: OrderRepository> {
    source: S,
    dispatcher: OrderEventDispatcher<R>,
    settings: ConsumerSettings,
    handle: AgentHandle,
    metrics: Option<Arc<Metrics>>,
}

impl<S: MessageSource, R: OrderRepository> OrderEventAgent<S, R> {
    pub fn new(source: S, dispatcher: OrderEventDispatcher<R>, settings: ConsumerSettings) -> Self {
        Self {
            source,
            dispatcher,
            settings,
            handle: AgentHandle::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.set_running(true);
        self.metrics = Some(metrics);
        self
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Pull one batch and decode it, without dispatching
    pub async fn poll(&mut self) -> Result<Vec<(RawMessage, Result<OrderEvent, DecodeError>)>, SourceError> {
        let batch = self.source.poll(self.settings.poll_timeout()).await?;

        if !batch.is_empty() {
            tracing::debug!(message_count = batch.len(), "📬 Polled order events");
            if let Some(metrics) = &self.metrics {
                metrics.record_received(batch.len());
            }
        }

        Ok(batch
            .into_iter()
            .map(|message| {
                let decoded = self.decode(&message);
                (message, decoded)
            })
            .collect())
    }

    /// One full poll → decode → dispatch cycle
    pub async fn run_once(&mut self) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("poll_cycle", batch_id = %batch_id);
        self.cycle().instrument(span).await
    }

    /// Keep cycling until the liveness flag is cleared
    pub async fn run(&mut self) {
        tracing::info!(
            poll_timeout_ms = self.settings.poll_timeout_ms,
            commit_policy = ?self.settings.commit_policy,
            "🔄 Order event agent started"
        );

        while self.is_running() {
            self.run_once().await;
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_running(false);
        }
        tracing::info!("Order event agent stopped");
    }

    /// Close the source within the configured timeout; failures are only logged
    pub async fn safe_close(&mut self) {
        self.handle.stop();
        match self.source.close(self.settings.close_timeout()).await {
            Ok(()) => tracing::info!("Order event consumer closed"),
            Err(e) => tracing::warn!(error = %e, "Failed closing order event consumer"),
        }
    }

    async fn cycle(&mut self) -> BatchReport {
        let mut report = BatchReport::default();

        let batch = match self.poll().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(error = %e, "Failed to poll orders channel");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                return report;
            }
        };
        report.received = batch.len();

        let explicit_commit = self.settings.commit_policy == CommitPolicy::AfterDispatch;
        let mut rewound: Vec<(String, i32)> = Vec::new();

        // Strictly sequential: the next message waits for this one to settle
        for (message, decoded) in batch {
            if rewound.iter().any(|(topic, partition)| *topic == message.topic && *partition == message.partition) {
                report.deferred += 1;
                continue;
            }

            let outcome = match decoded {
                Ok(event) => self.dispatch(&event).await,
                Err(e) => MessageOutcome::Undecodable(e),
            };
            report.record(&outcome);

            if !explicit_commit {
                continue;
            }
            if outcome.is_settled() {
                self.commit(&message).await;
            } else if self.rewind(&message).await {
                rewound.push((message.topic.clone(), message.partition));
            }
        }

        // Give the order store a moment before the rewound messages come back
        if !rewound.is_empty() {
            tokio::time::sleep(POLL_ERROR_BACKOFF).await;
        }

        report
    }

    async fn dispatch(&self, event: &OrderEvent) -> MessageOutcome {
        match self.dispatcher.apply(event).await {
            Ok(ack) => MessageOutcome::Dispatched(ack),
            Err(e) => MessageOutcome::Dropped(e),
        }
    }

    async fn commit(&mut self, message: &RawMessage) {
        if let Err(e) = self.source.commit(message).await {
            tracing::warn!(
                error = %e,
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Failed to commit offset"
            );
        }
    }

    /// Seek back to `message`; false when the position could not be moved
    async fn rewind(&mut self, message: &RawMessage) -> bool {
        match self.source.seek(message).await {
            Ok(()) => {
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Rewound partition for redelivery"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Failed to rewind partition, message will not be redelivered"
                );
                false
            }
        }
    }

    fn decode(&self, message: &RawMessage) -> Result<OrderEvent, DecodeError> {
        let decoded = decode(message.body());

        match &decoded {
            Ok(event) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_decoded(event.event_type().as_str());
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    reason = e.reason(),
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    body = %String::from_utf8_lossy(message.body()),
                    "Skipping undecodable order event"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_decode_failure(e.reason());
                }
            }
        }

        decoded
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, ShippingOrder};
    use crate::events::EventType;
    use crate::test_support::{RecordingRepository, RepositoryCall, ScriptedSource};

    fn settings(commit_policy: CommitPolicy) -> ConsumerSettings {
        ConsumerSettings {
            commit_policy,
            poll_timeout_ms: 10,
            close_timeout_ms: 10,
            ..ConsumerSettings::default()
        }
    }

    fn message(offset: i64, body: &str) -> RawMessage {
        message_on(0, offset, body)
    }

    fn message_on(partition: i32, offset: i64, body: &str) -> RawMessage {
        RawMessage::new("orders", partition, offset, body)
    }

    fn voyage_assigned(order_id: &str, voyage_id: &str) -> String {
        format!(
            r#"{{"timestamp":1,"type":"VoyageAssigned","version":"1","payload":{{"orderID":"{}","voyageID":"{}"}}}}"#,
            order_id, voyage_id
        )
    }

    fn cancelled(order_id: &str, reason: &str) -> String {
        format!(
            r#"{{"timestamp":2,"type":"OrderCancelled","version":"1","payload":{{"orderID":"{}","reason":"{}"}}}}"#,
            order_id, reason
        )
    }

    fn spoilt(order_id: &str) -> String {
        format!(
            r#"{{"timestamp":3,"type":"OrderSpoilt","version":"1","payload":{{"orderID":"{}"}}}}"#,
            order_id
        )
    }

    fn created(order_id: &str) -> String {
        format!(
            r#"{{"timestamp":0,"type":"OrderCreated","version":"1","payload":{{"orderID":"{}","productID":"P1","customerID":"C1","quantity":1}}}}"#,
            order_id
        )
    }

    async fn agent(
        batches: Vec<Vec<RawMessage>>,
        orders: &[&str],
        commit_policy: CommitPolicy,
    ) -> (OrderEventAgent<ScriptedSource, RecordingRepository>, RecordingRepository, ScriptedSource) {
        let repository = RecordingRepository::new();
        for order_id in orders {
            repository.seed(ShippingOrder::new(*order_id, "P1", "C1", 1)).await;
        }
        let source = ScriptedSource::new(batches);
        let dispatcher = OrderEventDispatcher::new(Arc::new(repository.clone()));
        let agent = OrderEventAgent::new(source.clone(), dispatcher, settings(commit_policy));
        (agent, repository, source)
    }

    #[tokio::test]
    async fn test_voyage_then_cancel_in_one_poll() {
        let batch = vec![message(0, &voyage_assigned("O1", "V9")), message(1, &cancelled("O1", "customer"))];
        let (mut agent, repository, _source) = agent(vec![batch], &["O1"], CommitPolicy::Auto).await;

        let report = agent.run_once().await;

        assert_eq!(report.received, 2);
        assert_eq!(report.applied, 2);
        let order = repository.stored("O1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.voyage_id.as_deref(), Some("V9"));
        assert_eq!(order.cancellation_reason.as_deref(), Some("customer"));
    }

    #[tokio::test]
    async fn test_unknown_type_does_not_stop_the_batch() {
        let batch = vec![
            message(0, r#"{"type":"unknown-type","payload":{"orderID":"O1"}}"#),
            message(1, &spoilt("O2")),
        ];
        let (mut agent, repository, _source) = agent(vec![batch], &["O1", "O2"], CommitPolicy::Auto).await;

        let report = agent.run_once().await;

        assert_eq!(report.decode_failures, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(repository.stored("O1").await.unwrap().status, OrderStatus::Pending);
        assert_eq!(repository.stored("O2").await.unwrap().status, OrderStatus::Spoilt);
        assert_eq!(
            repository.calls(),
            vec![RepositoryCall::Find("O2".to_string()), RepositoryCall::Update("O2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unknown_order_does_not_stop_the_batch() {
        let batch = vec![message(0, &cancelled("O99", "customer")), message(1, &voyage_assigned("O1", "V9"))];
        let (mut agent, repository, _source) = agent(vec![batch], &["O1"], CommitPolicy::Auto).await;

        let report = agent.run_once().await;

        assert_eq!(report.dispatch_failures, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(
            repository.calls(),
            vec![
                RepositoryCall::Find("O99".to_string()),
                RepositoryCall::Find("O1".to_string()),
                RepositoryCall::Update("O1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_messages_are_applied_in_arrival_order() {
        let batch = vec![
            message(0, &voyage_assigned("O2", "V2")),
            message(1, &voyage_assigned("O1", "V1")),
            message(2, &spoilt("O3")),
        ];
        let (mut agent, repository, _source) = agent(vec![batch], &["O1", "O2", "O3"], CommitPolicy::Auto).await;
        repository.set_find_delay(Duration::from_millis(5));

        agent.run_once().await;

        let updates: Vec<_> = repository
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RepositoryCall::Update(order_id) => Some(order_id),
                RepositoryCall::Find(_) => None,
            })
            .collect();
        assert_eq!(updates, vec!["O2", "O1", "O3"]);
        assert_eq!(repository.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_snapshots_and_garbage_are_counted() {
        let batch = vec![
            message(0, &created("O5")),
            message(1, "{not json"),
            RawMessage {
                payload: None,
                ..message(2, "")
            },
        ];
        let (mut agent, repository, _source) = agent(vec![batch], &[], CommitPolicy::Auto).await;

        let report = agent.run_once().await;

        assert_eq!(
            report,
            BatchReport {
                received: 3,
                applied: 0,
                no_action: 1,
                decode_failures: 2,
                dispatch_failures: 0,
                deferred: 0,
            }
        );
        assert!(repository.calls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_commit_never_commits_explicitly() {
        let batch = vec![message(0, &voyage_assigned("O1", "V9"))];
        let (mut agent, _repository, source) = agent(vec![batch], &["O1"], CommitPolicy::Auto).await;

        agent.run_once().await;

        assert!(source.committed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_dispatch_skips_transient_failures() {
        let batch = vec![
            message(10, &voyage_assigned("O1", "V9")),
            message(11, r#"{"type":"unknown-type"}"#),
            message(12, &cancelled("O99", "customer")),
            message(13, &spoilt("O1")),
        ];
        let (mut agent, repository, source) = agent(vec![batch], &["O1"], CommitPolicy::AfterDispatch).await;

        // First message settles, then the store starts failing
        repository.fail_updates_after(1);
        agent.run_once().await;

        // 13 hit a store failure: uncommitted and rewound
        assert_eq!(source.committed(), vec![10, 11, 12]);
        assert_eq!(source.seeks(), vec![(0, 13)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_is_redelivered_in_order() {
        let batch = vec![
            message_on(1, 5, &spoilt("O2")),
            message_on(0, 10, &voyage_assigned("O1", "V9")),
            message_on(0, 11, &spoilt("O1")),
        ];
        let (mut agent, repository, source) = agent(vec![batch], &["O1", "O2"], CommitPolicy::AfterDispatch).await;

        repository.fail_updates_after(1);
        let report = agent.run_once().await;

        assert_eq!(report.applied, 1);
        assert_eq!(report.dispatch_failures, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(source.committed(), vec![5]);
        assert_eq!(source.seeks(), vec![(0, 10)]);

        // Store is back: both partition 0 messages come again, in order
        repository.fail_updates(false);
        let report = agent.run_once().await;

        assert_eq!(report.received, 2);
        assert_eq!(report.applied, 2);
        assert_eq!(source.committed(), vec![5, 10, 11]);
        let order = repository.stored("O1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Spoilt);
        assert_eq!(order.voyage_id.as_deref(), Some("V9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_commit_never_rewinds() {
        let batch = vec![message(0, &voyage_assigned("O1", "V9")), message(1, &spoilt("O1"))];
        let (mut agent, repository, source) = agent(vec![batch], &["O1"], CommitPolicy::Auto).await;

        repository.fail_updates(true);
        let report = agent.run_once().await;

        assert_eq!(report.dispatch_failures, 2);
        assert_eq!(report.deferred, 0);
        assert!(source.seeks().is_empty());
    }

    #[tokio::test]
    async fn test_poll_decodes_without_dispatching() {
        let batch = vec![message(0, &spoilt("O1")), message(1, r#"{"type":"Nope"}"#)];
        let (mut agent, repository, _source) = agent(vec![batch], &["O1"], CommitPolicy::Auto).await;

        let polled = agent.poll().await.unwrap();

        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0].1.as_ref().unwrap().event_type(), EventType::OrderSpoilt);
        assert_eq!(polled[1].1, Err(DecodeError::UnsupportedType("Nope".to_string())));
        assert!(repository.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_is_survived() {
        let (mut agent, _repository, source) = agent(vec![], &[], CommitPolicy::Auto).await;
        source.fail_next_poll();

        let report = agent.run_once().await;

        assert_eq!(report, BatchReport::default());
        assert!(agent.is_running());
    }

    #[tokio::test]
    async fn test_run_until_stopped_then_close() {
        let batches = vec![
            vec![message(0, &voyage_assigned("O1", "V9"))],
            vec![],
            vec![message(1, &spoilt("O1"))],
        ];
        let (mut agent, repository, source) = agent(batches, &["O1"], CommitPolicy::Auto).await;
        source.stop_when_drained(agent.handle());

        agent.run().await;
        assert!(!agent.is_running());

        let order = repository.stored("O1").await.unwrap();
        assert_eq!(order.status, OrderStatus::Spoilt);
        assert_eq!(order.voyage_id.as_deref(), Some("V9"));

        agent.safe_close().await;
        assert!(source.is_closed());
    }

    #[tokio::test]
    async fn test_close_failure_is_swallowed() {
        let (mut agent, _repository, source) = agent(vec![], &[], CommitPolicy::Auto).await;
        source.fail_close();

        agent.safe_close().await;

        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn test_metrics_follow_the_loop() {
        let batch = vec![message(0, &spoilt("O1")), message(1, "garbage")];
        let (agent, _repository, source) = agent(vec![batch], &["O1"], CommitPolicy::Auto).await;
        let metrics = Arc::new(Metrics::new().unwrap());
        let mut agent = agent.with_metrics(metrics.clone());
        source.stop_when_drained(agent.handle());

        agent.run().await;

        assert_eq!(metrics.events_received.get(), 2);
        assert_eq!(metrics.events_decoded.with_label_values(&["OrderSpoilt"]).get(), 1);
        assert_eq!(metrics.decode_failures.with_label_values(&["malformed_payload"]).get(), 1);
        assert_eq!(metrics.agent_running.get(), 0);
    }
}
