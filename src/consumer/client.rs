//! Client abstraction used by the consumption engine.
//!
//! The engine never talks to brokers directly. It asks a [`PartitionClient`]
//! for partition lists and offset watermarks, and reads messages through the
//! [`PartitionReader`] handles the client opens. The rdkafka-backed
//! implementation lives in [`super::kafka`]; [`super::fake`] provides an
//! in-memory one.

use async_trait::async_trait;

use super::error::ConsumeError;
use super::message::ConsumedMessage;

/// Access to the partitions of a topic.
///
/// # Example
///
/// ```rust
/// use kaftail::consumer::{FakeClient, PartitionClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), kaftail::consumer::ConsumeError> {
/// let client = FakeClient::new().with_partition("events", 0, 3);
/// assert_eq!(client.list_partitions("events").await?, vec![0]);
/// assert_eq!(client.newest_offset("events", 0).await?, 3);
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PartitionClient: Send + Sync {
    /// Lists the partition ids of a topic.
    async fn list_partitions(&self, topic: &str) -> Result<Vec<i32>, ConsumeError>;

    /// Returns the offset of the oldest message still retained.
    async fn oldest_offset(&self, topic: &str, partition: i32) -> Result<i64, ConsumeError>;

    /// Returns the offset the next produced message will get.
    async fn newest_offset(&self, topic: &str, partition: i32) -> Result<i64, ConsumeError>;

    /// Returns `(oldest, newest)` for a partition.
    ///
    /// Clients that can answer both in one round trip should override this.
    async fn watermarks(&self, topic: &str, partition: i32) -> Result<(i64, i64), ConsumeError> {
        let oldest = self.oldest_offset(topic, partition).await?;
        let newest = self.newest_offset(topic, partition).await?;
        Ok((oldest, newest))
    }

    /// Opens a reader positioned at `start`.
    async fn open_reader(
        &self,
        topic: &str,
        partition: i32,
        start: i64,
    ) -> Result<Box<dyn PartitionReader>, ConsumeError>;
}

/// A reader over a single partition.
#[async_trait]
pub trait PartitionReader: Send {
    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` when the underlying stream has ended. A followed
    /// broker log never ends; the call simply stays pending.
    async fn recv(&mut self) -> Result<Option<ConsumedMessage>, ConsumeError>;

    /// Requests the reader to close without waiting for it.
    fn close(self: Box<Self>);
}
