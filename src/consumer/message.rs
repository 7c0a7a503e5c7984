//! Messages read from a partition.

use chrono::{DateTime, Utc};

/// A message read from one partition of a topic.
///
/// Offsets are strictly increasing within a partition and carry no meaning
/// across partitions. Instances are immutable once a reader produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    /// Partition the message was read from
    pub partition: i32,

    /// Offset within the partition
    pub offset: i64,

    /// Message key, if any
    pub key: Option<Vec<u8>>,

    /// Message value, if any (absent for tombstones)
    pub value: Option<Vec<u8>>,

    /// Broker or producer timestamp, if the log records one
    pub timestamp: Option<DateTime<Utc>>,

    /// Record headers in wire order
    pub headers: Vec<(String, Vec<u8>)>,
}

impl ConsumedMessage {
    /// Creates a message with no key, value, timestamp or headers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kaftail::consumer::ConsumedMessage;
    ///
    /// let message = ConsumedMessage::new(0, 7).with_value(b"hello".to_vec());
    /// assert_eq!(message.offset, 7);
    /// assert_eq!(message.value.as_deref(), Some(&b"hello"[..]));
    /// ```
    pub fn new(partition: i32, offset: i64) -> Self {
        Self {
            partition,
            offset,
            key: None,
            value: None,
            timestamp: None,
            headers: Vec::new(),
        }
    }

    /// Sets the message key.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the message value.
    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the timestamp from milliseconds since the Unix epoch.
    ///
    /// Out-of-range values leave the timestamp unset.
    pub fn with_timestamp_millis(mut self, millis: i64) -> Self {
        self.timestamp = DateTime::<Utc>::from_timestamp_millis(millis);
        self
    }

    /// Appends a header.
    pub fn with_header(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}
