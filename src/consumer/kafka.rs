//! rdkafka-backed partition client.
//!
//! Metadata and watermark queries go through one shared `BaseConsumer` and
//! run on the blocking thread pool, since librdkafka answers them
//! synchronously. Every partition reader owns its own `StreamConsumer` with a
//! manual assignment, so no consumer group coordination is involved.
//!
//! # Example
//!
//! ```rust,no_run
//! use kaftail::consumer::config::KafkaClientConfig;
//! use kaftail::consumer::{KafkaClient, PartitionClient};
//!
//! # async fn example() -> Result<(), kaftail::consumer::ConsumeError> {
//! let client = KafkaClient::new(KafkaClientConfig::new("localhost:9092", "kaftail"))?;
//! let partitions = client.list_partitions("events").await?;
//! println!("events has {} partitions", partitions.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::consumer::{BaseConsumer, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use super::client::{PartitionClient, PartitionReader};
use super::config::KafkaClientConfig;
use super::error::ConsumeError;
use super::message::ConsumedMessage;

/// Partition client talking to a Kafka cluster through librdkafka.
pub struct KafkaClient {
    config: KafkaClientConfig,
    metadata: Arc<BaseConsumer>,
}

impl KafkaClient {
    /// Creates a client. No connection is made until the first query.
    ///
    /// # Errors
    ///
    /// Returns `ConsumeError::Kafka` if librdkafka rejects the settings.
    pub fn new(config: KafkaClientConfig) -> Result<Self, ConsumeError> {
        info!(
            brokers = %config.brokers,
            client_id = %config.client_id,
            security_protocol = %config.security_protocol.as_str(),
            "Creating Kafka client"
        );

        let metadata: BaseConsumer = config.client_config().create()?;

        Ok(Self {
            config,
            metadata: Arc::new(metadata),
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &KafkaClientConfig {
        &self.config
    }

    async fn fetch_watermarks(&self, topic: &str, partition: i32) -> Result<(i64, i64), ConsumeError> {
        let consumer = Arc::clone(&self.metadata);
        let topic = topic.to_string();
        let timeout = self.config.metadata_timeout;

        tokio::task::spawn_blocking(move || consumer.fetch_watermarks(&topic, partition, timeout))
            .await
            .map_err(|e| ConsumeError::OffsetFetch {
                partition,
                message: e.to_string(),
            })?
            .map_err(|e| ConsumeError::OffsetFetch {
                partition,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl PartitionClient for KafkaClient {
    async fn list_partitions(&self, topic: &str) -> Result<Vec<i32>, ConsumeError> {
        let consumer = Arc::clone(&self.metadata);
        let name = topic.to_string();
        let timeout = self.config.metadata_timeout;
        let list_error = |message: String| ConsumeError::ListPartitions {
            topic: topic.to_string(),
            message,
        };

        let fetched = tokio::task::spawn_blocking(move || {
            let metadata = consumer
                .fetch_metadata(Some(name.as_str()), timeout)
                .map_err(|e| e.to_string())?;
            let entry = metadata
                .topics()
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| "topic not found in metadata".to_string())?;
            if let Some(err) = entry.error() {
                return Err(format!("{:?}", err));
            }
            Ok(entry.partitions().iter().map(|p| p.id()).collect::<Vec<i32>>())
        })
        .await
        .map_err(|e| list_error(e.to_string()))?;

        let partitions = fetched.map_err(list_error)?;
        debug!(topic = %topic, count = partitions.len(), "Fetched partition list");
        Ok(partitions)
    }

    async fn oldest_offset(&self, topic: &str, partition: i32) -> Result<i64, ConsumeError> {
        Ok(self.fetch_watermarks(topic, partition).await?.0)
    }

    async fn newest_offset(&self, topic: &str, partition: i32) -> Result<i64, ConsumeError> {
        Ok(self.fetch_watermarks(topic, partition).await?.1)
    }

    async fn watermarks(&self, topic: &str, partition: i32) -> Result<(i64, i64), ConsumeError> {
        self.fetch_watermarks(topic, partition).await
    }

    async fn open_reader(
        &self,
        topic: &str,
        partition: i32,
        start: i64,
    ) -> Result<Box<dyn PartitionReader>, ConsumeError> {
        let open_error = |message: String| ConsumeError::OpenReader { partition, message };

        let consumer: StreamConsumer = self
            .config
            .client_config()
            .create()
            .map_err(|e| open_error(e.to_string()))?;

        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(topic, partition, Offset::Offset(start))
            .map_err(|e| open_error(e.to_string()))?;
        consumer
            .assign(&assignment)
            .map_err(|e| open_error(e.to_string()))?;

        debug!(topic = %topic, partition, start, "Opened partition reader");
        Ok(Box::new(KafkaPartitionReader { consumer, partition }))
    }
}

/// Reader over one assigned partition.
struct KafkaPartitionReader {
    consumer: StreamConsumer,
    partition: i32,
}

#[async_trait]
impl PartitionReader for KafkaPartitionReader {
    async fn recv(&mut self) -> Result<Option<ConsumedMessage>, ConsumeError> {
        loop {
            match self.consumer.recv().await {
                Ok(message) => return Ok(Some(to_consumed(&message))),
                // librdkafka retries broker failures internally; errors
                // surfaced here are informational.
                Err(e) => warn!(partition = self.partition, error = %e, "Kafka receive error"),
            }
        }
    }

    fn close(self: Box<Self>) {
        let partition = self.partition;
        let consumer = self.consumer;
        // Dropping a consumer blocks until librdkafka has shut it down.
        tokio::task::spawn_blocking(move || {
            drop(consumer);
            debug!(partition, "Partition reader closed");
        });
    }
}

fn to_consumed(message: &BorrowedMessage<'_>) -> ConsumedMessage {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| (h.key.to_string(), h.value.map(<[u8]>::to_vec).unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    ConsumedMessage {
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        value: message.payload().map(<[u8]>::to_vec),
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        headers,
    }
}
