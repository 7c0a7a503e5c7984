//! Errors raised by the consumption engine.

use thiserror::Error;

use crate::decode::DecodeError;

/// Errors that can occur while consuming a topic.
///
/// Configuration errors are raised before any worker starts. Setup, decode
/// and worker errors are funnelled through the
/// [`Coordinator`](super::Coordinator), which keeps only the first one.
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// Conflicting or missing consumption flags.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The partition list of a topic could not be fetched.
    #[error("Failed to list partitions of topic {topic}: {message}")]
    ListPartitions {
        /// Topic that was queried
        topic: String,
        /// Underlying client error
        message: String,
    },

    /// The oldest or newest offset of a partition could not be fetched.
    #[error("Failed to fetch offsets for partition {partition}: {message}")]
    OffsetFetch {
        /// Partition that was queried
        partition: i32,
        /// Underlying client error
        message: String,
    },

    /// A partition reader could not be opened.
    #[error("Failed to start consumer for partition {partition}: {message}")]
    OpenReader {
        /// Partition whose reader failed to open
        partition: i32,
        /// Underlying client error
        message: String,
    },

    /// A message payload could not be decoded.
    #[error("Failed to decode message at partition {partition} offset {offset}: {source}")]
    Decode {
        /// Partition of the message
        partition: i32,
        /// Offset of the message
        offset: i64,
        /// Error reported by the deserializer that accepted the payload
        #[source]
        source: DecodeError,
    },

    /// The output sink failed (broken pipe, disk full, ...).
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// Error from the Kafka client.
    #[error("Kafka error: {0}")]
    Kafka(String),

    /// A partition worker terminated abnormally.
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl ConsumeError {
    /// Returns true for errors detected before any network access.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<rdkafka::error::KafkaError> for ConsumeError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::Kafka(err.to_string())
    }
}
