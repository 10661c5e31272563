use async_trait::async_trait;
use rdkafka::error::KafkaError;
use std::time::Duration;

// ============================================================================
// Message Source Port
// ============================================================================
//
// What the consumption loop needs from a broker: bounded polling, explicit
// offset commit and a bounded close. The Kafka implementation lives next
// door; tests drive the loop with scripted sources.
//
// ============================================================================

/// One message pulled from a channel, detached from the client's buffers
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    /// `None` for tombstones
    pub payload: Option<Vec<u8>>,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: Some(payload.into()),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Body bytes; a tombstone reads as an empty body
    pub fn body(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Message source is closed")]
    Closed,

    #[error("Close did not complete within {0:?}")]
    CloseTimedOut(Duration),

    #[error("Shutdown failed: {0}")]
    Shutdown(String),
}

#[async_trait]
pub trait MessageSource: Send {
    /// Wait up to `timeout` for messages; an empty batch means nothing arrived
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, SourceError>;

    /// Mark `message` as processed for its partition
    async fn commit(&mut self, message: &RawMessage) -> Result<(), SourceError>;

    /// Move the partition position back so `message` is delivered again
    async fn seek(&mut self, message: &RawMessage) -> Result<(), SourceError>;

    /// Release the connection within `timeout`
    async fn close(&mut self, timeout: Duration) -> Result<(), SourceError>;
}
