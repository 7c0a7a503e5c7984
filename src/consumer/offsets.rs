//! Offset resolution.
//!
//! Turns a [`ConsumptionRequest`] into per-partition [`OffsetBound`]s before
//! any reader is opened. Rules, in precedence order:
//!
//! 1. `exit` needs `from_beginning` or explicit offsets.
//! 2. `tail` and explicit offsets are mutually exclusive.
//! 3. `tail` N reads `max(oldest, newest - N) ..= newest - 1`.
//! 4. `exit` ends at `newest - 1`, fetched once at resolution time.
//! 5. An explicit offset for the partition sets the start.
//! 6. `from_beginning` starts at the oldest offset.
//! 7. Otherwise the partition is followed from its newest offset.
//!
//! Offsets are fetched lazily: a rule that does not need a watermark never
//! asks for it. Tail and exit take both watermarks from a single query.

use std::fmt;

use super::client::PartitionClient;
use super::error::ConsumeError;
use super::request::{ConsumptionRequest, OffsetSpec};

/// Inclusive offset range to read from one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetBound {
    /// Partition the bound applies to
    pub partition: i32,
    /// First offset to read
    pub start: i64,
    /// Last offset to read, inclusive; `None` follows the partition forever
    pub end: Option<i64>,
}

impl OffsetBound {
    /// A bound that follows the partition forever from `start`.
    pub fn unbounded(partition: i32, start: i64) -> Self {
        Self {
            partition,
            start,
            end: None,
        }
    }

    /// A bound covering `start..=end`.
    pub fn bounded(partition: i32, start: i64, end: i64) -> Self {
        Self {
            partition,
            start,
            end: Some(end),
        }
    }

    /// True when there is nothing to read; such partitions are never opened.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kaftail::consumer::OffsetBound;
    ///
    /// // An empty partition with oldest == newest == 4 asked for a tail.
    /// assert!(OffsetBound::bounded(0, 4, 3).is_empty());
    /// assert!(!OffsetBound::bounded(0, 3, 3).is_empty());
    /// assert!(!OffsetBound::unbounded(0, 4).is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.end.is_some_and(|end| end < 0 || self.start > end)
    }

    /// True when `offset` is at or past the inclusive end.
    pub fn reached_by(&self, offset: i64) -> bool {
        self.end.is_some_and(|end| offset >= end)
    }
}

impl fmt::Display for OffsetBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "partition {} [{}..={}]", self.partition, self.start, end),
            None => write!(f, "partition {} [{}..]", self.partition, self.start),
        }
    }
}

/// Watermarks of one partition, fetched on first use.
struct Watermarks<'a> {
    client: &'a dyn PartitionClient,
    topic: &'a str,
    partition: i32,
    oldest: Option<i64>,
    newest: Option<i64>,
}

impl<'a> Watermarks<'a> {
    fn new(client: &'a dyn PartitionClient, topic: &'a str, partition: i32) -> Self {
        Self {
            client,
            topic,
            partition,
            oldest: None,
            newest: None,
        }
    }

    async fn oldest(&mut self) -> Result<i64, ConsumeError> {
        if let Some(oldest) = self.oldest {
            return Ok(oldest);
        }
        let oldest = self.client.oldest_offset(self.topic, self.partition).await?;
        self.oldest = Some(oldest);
        Ok(oldest)
    }

    async fn newest(&mut self) -> Result<i64, ConsumeError> {
        if let Some(newest) = self.newest {
            return Ok(newest);
        }
        let newest = self.client.newest_offset(self.topic, self.partition).await?;
        self.newest = Some(newest);
        Ok(newest)
    }

    /// Both watermarks from a single query.
    async fn both(&mut self) -> Result<(i64, i64), ConsumeError> {
        if let (Some(oldest), Some(newest)) = (self.oldest, self.newest) {
            return Ok((oldest, newest));
        }
        let (oldest, newest) = self.client.watermarks(self.topic, self.partition).await?;
        self.oldest = Some(oldest);
        self.newest = Some(newest);
        Ok((oldest, newest))
    }
}

/// Resolves the offset bound of one partition.
///
/// # Errors
///
/// Returns `ConsumeError::Config` for invalid flag combinations, before any
/// client call, and the client's error when an offset query fails.
///
/// # Example
///
/// ```rust
/// use kaftail::consumer::{resolve_bound, ConsumptionRequest, FakeClient, OffsetBound};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), kaftail::consumer::ConsumeError> {
/// let client = FakeClient::new().with_partition("events", 0, 10);
/// let request = ConsumptionRequest::new("events").with_tail(3);
///
/// let bound = resolve_bound(&client, &request, 0).await?;
/// assert_eq!(bound, OffsetBound::bounded(0, 7, 9));
/// # Ok(())
/// # }
/// ```
pub async fn resolve_bound(
    client: &dyn PartitionClient,
    request: &ConsumptionRequest,
    partition: i32,
) -> Result<OffsetBound, ConsumeError> {
    request.validate()?;

    let mut marks = Watermarks::new(client, &request.topic, partition);

    if let Some(tail) = request.tail {
        let (oldest, newest) = marks.both().await?;
        let tail = i64::try_from(tail).unwrap_or(i64::MAX);
        let start = oldest.max(newest.saturating_sub(tail));
        return Ok(OffsetBound::bounded(partition, start, newest - 1));
    }

    let end = if request.exit {
        let (_, newest) = marks.both().await?;
        Some(newest - 1)
    } else {
        None
    };

    let start = match request.offset_for(partition) {
        Some(OffsetSpec::At(offset)) => offset,
        Some(OffsetSpec::Oldest) => marks.oldest().await?,
        Some(OffsetSpec::Newest) => marks.newest().await?,
        None if request.from_beginning => marks.oldest().await?,
        None => marks.newest().await?,
    };

    Ok(OffsetBound {
        partition,
        start,
        end,
    })
}
