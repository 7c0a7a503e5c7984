//! In-memory partition client for tests and embedding.
//!
//! [`FakeClient`] holds topics as plain vectors of [`ConsumedMessage`] and
//! hands out readers that walk them. Once a reader has seen every message it
//! waits for more instead of ending, like a followed broker log, so bounded
//! modes stop through their boundary or the idle timeout exactly as they do
//! against a real cluster. Messages appended with [`FakeClient::append`]
//! wake waiting readers.
//!
//! Failures can be injected per partition, and the client records which
//! readers were opened and closed and how many offset queries were made.
//!
//! # Example
//!
//! ```
//! use kaftail::consumer::{FakeClient, PartitionClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kaftail::consumer::ConsumeError> {
//! let client = FakeClient::new().with_partition("events", 0, 10);
//!
//! let mut reader = client.open_reader("events", 0, 7).await?;
//! let message = reader.recv().await?.unwrap();
//! assert_eq!(message.offset, 7);
//! reader.close();
//!
//! assert_eq!(client.closed_readers(), vec![0]);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use super::client::{PartitionClient, PartitionReader};
use super::error::ConsumeError;
use super::message::ConsumedMessage;

/// Timestamp of offset 0 for generated messages (2024-01-01T00:00:00Z).
const BASE_TIMESTAMP_MILLIS: i64 = 1_704_067_200_000;

#[derive(Debug, Default)]
struct FakePartition {
    oldest: i64,
    messages: Vec<ConsumedMessage>,
}

impl FakePartition {
    fn newest(&self) -> i64 {
        self.messages
            .last()
            .map(|m| m.offset + 1)
            .unwrap_or(self.oldest)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    topics: BTreeMap<String, BTreeMap<i32, FakePartition>>,
    open_failures: HashSet<i32>,
    offset_failures: HashSet<i32>,
    offset_fetches: usize,
    opened: Vec<(i32, i64)>,
    closed: Vec<i32>,
}

/// Deterministic in-memory [`PartitionClient`].
#[derive(Debug, Clone)]
pub struct FakeClient {
    state: Arc<Mutex<FakeState>>,
    appended: Arc<watch::Sender<u64>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClient {
    /// Creates a client with no topics.
    pub fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            appended: Arc::new(appended),
        }
    }

    /// Adds a partition holding `count` generated messages at offsets
    /// `0..count`.
    ///
    /// Message `n` has key `key-n`, value `message-n` and a timestamp `n`
    /// seconds after 2024-01-01T00:00:00Z.
    pub fn with_partition(self, topic: &str, partition: i32, count: i64) -> Self {
        let messages = (0..count)
            .map(|offset| {
                ConsumedMessage::new(partition, offset)
                    .with_key(format!("key-{}", offset))
                    .with_value(format!("message-{}", offset))
                    .with_timestamp_millis(BASE_TIMESTAMP_MILLIS + offset * 1000)
            })
            .collect();
        self.with_messages(topic, partition, messages)
    }

    /// Adds a partition holding the given messages.
    ///
    /// Messages must be in ascending offset order. The oldest offset is the
    /// first message's offset, or 0 for an empty partition.
    pub fn with_messages(self, topic: &str, partition: i32, messages: Vec<ConsumedMessage>) -> Self {
        let oldest = messages.first().map(|m| m.offset).unwrap_or(0);
        self.lock()
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(partition, FakePartition { oldest, messages });
        self
    }

    /// Makes `open_reader` fail for `partition`.
    pub fn with_open_failure(self, partition: i32) -> Self {
        self.lock().open_failures.insert(partition);
        self
    }

    /// Makes offset queries fail for `partition`.
    pub fn with_offset_failure(self, partition: i32) -> Self {
        self.lock().offset_failures.insert(partition);
        self
    }

    /// Appends a message to a partition and wakes waiting readers.
    ///
    /// The message offset is assigned by the partition.
    pub fn append(&self, topic: &str, partition: i32, message: ConsumedMessage) -> i64 {
        let offset = {
            let mut state = self.lock();
            let entry = state
                .topics
                .entry(topic.to_string())
                .or_default()
                .entry(partition)
                .or_default();
            let offset = entry.newest();
            entry.messages.push(ConsumedMessage {
                partition,
                offset,
                ..message
            });
            offset
        };
        self.appended.send_modify(|version| *version += 1);
        offset
    }

    /// Number of oldest/newest offset queries served so far.
    pub fn offset_fetches(&self) -> usize {
        self.lock().offset_fetches
    }

    /// `(partition, start)` of every reader opened so far.
    pub fn opened_readers(&self) -> Vec<(i32, i64)> {
        self.lock().opened.clone()
    }

    /// Partitions whose readers have been closed, in closing order.
    pub fn closed_readers(&self) -> Vec<i32> {
        self.lock().closed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn offsets(&self, topic: &str, partition: i32) -> Result<(i64, i64), ConsumeError> {
        let mut state = self.lock();
        state.offset_fetches += 1;

        if state.offset_failures.contains(&partition) {
            return Err(ConsumeError::OffsetFetch {
                partition,
                message: "injected offset failure".to_string(),
            });
        }

        state
            .topics
            .get(topic)
            .and_then(|partitions| partitions.get(&partition))
            .map(|p| (p.oldest, p.newest()))
            .ok_or_else(|| ConsumeError::OffsetFetch {
                partition,
                message: format!("unknown partition {} of topic {}", partition, topic),
            })
    }
}

#[async_trait]
impl PartitionClient for FakeClient {
    async fn list_partitions(&self, topic: &str) -> Result<Vec<i32>, ConsumeError> {
        self.lock()
            .topics
            .get(topic)
            .map(|partitions| partitions.keys().copied().collect())
            .ok_or_else(|| ConsumeError::ListPartitions {
                topic: topic.to_string(),
                message: "unknown topic".to_string(),
            })
    }

    async fn oldest_offset(&self, topic: &str, partition: i32) -> Result<i64, ConsumeError> {
        Ok(self.offsets(topic, partition)?.0)
    }

    async fn newest_offset(&self, topic: &str, partition: i32) -> Result<i64, ConsumeError> {
        Ok(self.offsets(topic, partition)?.1)
    }

    async fn watermarks(&self, topic: &str, partition: i32) -> Result<(i64, i64), ConsumeError> {
        self.offsets(topic, partition)
    }

    async fn open_reader(
        &self,
        topic: &str,
        partition: i32,
        start: i64,
    ) -> Result<Box<dyn PartitionReader>, ConsumeError> {
        let mut state = self.lock();
        if state.open_failures.contains(&partition) {
            return Err(ConsumeError::OpenReader {
                partition,
                message: "injected open failure".to_string(),
            });
        }
        state.opened.push((partition, start));
        drop(state);

        Ok(Box::new(FakeReader {
            client: self.clone(),
            appended: self.appended.subscribe(),
            topic: topic.to_string(),
            partition,
            next: start,
        }))
    }
}

struct FakeReader {
    client: FakeClient,
    appended: watch::Receiver<u64>,
    topic: String,
    partition: i32,
    next: i64,
}

impl FakeReader {
    fn next_available(&self) -> Option<ConsumedMessage> {
        let state = self.client.lock();
        state
            .topics
            .get(&self.topic)?
            .get(&self.partition)?
            .messages
            .iter()
            .find(|m| m.offset >= self.next)
            .cloned()
    }
}

#[async_trait]
impl PartitionReader for FakeReader {
    async fn recv(&mut self) -> Result<Option<ConsumedMessage>, ConsumeError> {
        loop {
            self.appended.borrow_and_update();
            if let Some(message) = self.next_available() {
                self.next = message.offset + 1;
                return Ok(Some(message));
            }
            if self.appended.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    fn close(self: Box<Self>) {
        self.client.lock().closed.push(self.partition);
    }
}
