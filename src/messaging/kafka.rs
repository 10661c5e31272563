use async_trait::async_trait;
use futures_util::FutureExt;
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Message},
    Offset, TopicPartitionList,
};
use std::time::Duration;

use crate::config::{ConsumerSettings, KafkaSettings};
use super::source::{MessageSource, RawMessage, SourceError};

// ============================================================================
// Kafka Message Source
// ============================================================================
//
// StreamConsumer subscribed to a single channel. A poll waits for the first
// message up to the timeout, then drains whatever is already buffered
// (bounded by max_poll_records) without waiting again.
//
// ============================================================================

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaMessageSource {
    consumer: Option<StreamConsumer>,
    max_poll_records: usize,
}

impl KafkaMessageSource {
    pub fn subscribe(kafka: &KafkaSettings, settings: &ConsumerSettings, topic: &str) -> Result<Self, SourceError> {
        let consumer: StreamConsumer = settings.client_config(kafka).create()?;
        consumer.subscribe(&[topic])?;

        tracing::info!(
            topic = %topic,
            group_id = %settings.group_id,
            client_id = %settings.client_id,
            commit_policy = ?settings.commit_policy,
            "Subscribed to orders channel"
        );

        Ok(Self {
            consumer: Some(consumer),
            max_poll_records: settings.max_poll_records,
        })
    }

    fn detach(message: &BorrowedMessage<'_>) -> RawMessage {
        RawMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: message.payload().map(|payload| payload.to_vec()),
        }
    }
}

#[async_trait]
impl MessageSource for KafkaMessageSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, SourceError> {
        let consumer = self.consumer.as_ref().ok_or(SourceError::Closed)?;

        let first = match tokio::time::timeout(timeout, consumer.recv()).await {
            Err(_elapsed) => return Ok(Vec::new()),
            Ok(received) => Self::detach(&received?),
        };

        let mut batch = vec![first];
        while batch.len() < self.max_poll_records {
            match consumer.recv().now_or_never() {
                Some(Ok(message)) => batch.push(Self::detach(&message)),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Kafka error while draining poll batch");
                    break;
                }
                None => break,
            }
        }

        Ok(batch)
    }

    async fn commit(&mut self, message: &RawMessage) -> Result<(), SourceError> {
        let consumer = self.consumer.as_ref().ok_or(SourceError::Closed)?;

        // Committed offset is the next one to read
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))?;
        consumer.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }

    async fn seek(&mut self, message: &RawMessage) -> Result<(), SourceError> {
        let consumer = self.consumer.as_ref().ok_or(SourceError::Closed)?;

        // Later messages of the partition still sitting in the fetch queue are discarded
        consumer.seek(&message.topic, message.partition, Offset::Offset(message.offset), SEEK_TIMEOUT)?;
        Ok(())
    }

    async fn close(&mut self, timeout: Duration) -> Result<(), SourceError> {
        let Some(consumer) = self.consumer.take() else {
            return Ok(());
        };

        consumer.unsubscribe();

        // Dropping the client leaves the group and flushes pending commits
        let closing = tokio::task::spawn_blocking(move || drop(consumer));
        match tokio::time::timeout(timeout, closing).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_error)) => Err(SourceError::Shutdown(join_error.to_string())),
            Err(_elapsed) => Err(SourceError::CloseTimedOut(timeout)),
        }
    }
}
