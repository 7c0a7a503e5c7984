//! Consumption requests as built from user intent.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::ConsumeError;

/// Default silence after which a bounded run treats a partition as caught up.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where an explicitly requested partition should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSpec {
    /// A concrete offset.
    At(i64),
    /// The oldest retained offset.
    Oldest,
    /// The offset the next produced message will get.
    Newest,
}

/// A `partition=offset` entry.
///
/// # Example
///
/// ```rust
/// use kaftail::consumer::{OffsetSpec, PartitionOffset};
///
/// let entry: PartitionOffset = "3=1200".parse().unwrap();
/// assert_eq!(entry.partition, 3);
/// assert_eq!(entry.offset, OffsetSpec::At(1200));
///
/// let entry: PartitionOffset = "0=oldest".parse().unwrap();
/// assert_eq!(entry.offset, OffsetSpec::Oldest);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOffset {
    /// Partition the entry applies to
    pub partition: i32,
    /// Requested start position
    pub offset: OffsetSpec,
}

impl FromStr for PartitionOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (partition, offset) = s
            .split_once('=')
            .ok_or_else(|| format!("expected PARTITION=OFFSET, got '{}'", s))?;

        let partition = partition
            .trim()
            .parse::<i32>()
            .map_err(|_| format!("invalid partition '{}'", partition.trim()))?;
        if partition < 0 {
            return Err(format!("invalid partition '{}'", partition));
        }

        let offset = match offset.trim().to_lowercase().as_str() {
            "oldest" => OffsetSpec::Oldest,
            "newest" => OffsetSpec::Newest,
            value => OffsetSpec::At(
                value
                    .parse::<i64>()
                    .ok()
                    .filter(|o| *o >= 0)
                    .ok_or_else(|| format!("invalid offset '{}'", offset.trim()))?,
            ),
        };

        Ok(Self { partition, offset })
    }
}

impl fmt::Display for PartitionOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            OffsetSpec::At(offset) => write!(f, "{}={}", self.partition, offset),
            OffsetSpec::Oldest => write!(f, "{}=oldest", self.partition),
            OffsetSpec::Newest => write!(f, "{}=newest", self.partition),
        }
    }
}

/// What to read from a topic and when to stop.
///
/// Built once per invocation and read-only afterwards.
///
/// # Example
///
/// ```rust
/// use kaftail::consumer::ConsumptionRequest;
///
/// let request = ConsumptionRequest::new("events").with_tail(3);
/// assert!(request.validate().is_ok());
/// assert!(request.is_bounded());
///
/// let request = ConsumptionRequest::new("events").with_exit(true);
/// assert!(request.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRequest {
    /// Topic to read
    pub topic: String,

    /// Partitions to read; empty means every partition of the topic
    pub partitions: Vec<i32>,

    /// Start every partition without an explicit offset at its oldest offset
    pub from_beginning: bool,

    /// Explicit per-partition start offsets
    pub offsets: Vec<PartitionOffset>,

    /// Only keep the N most recent messages across all partitions
    pub tail: Option<usize>,

    /// Stop once every partition reaches its newest offset at request time
    pub exit: bool,

    /// Silence after which a bounded run treats a partition as caught up
    pub idle_timeout: Duration,
}

impl ConsumptionRequest {
    /// Creates a request that follows every partition from its newest offset.
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            partitions: Vec::new(),
            from_beginning: false,
            offsets: Vec::new(),
            tail: None,
            exit: false,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Restricts the request to the given partitions.
    pub fn with_partitions(mut self, partitions: Vec<i32>) -> Self {
        self.partitions = partitions;
        self
    }

    /// Starts partitions without an explicit offset at their oldest offset.
    pub fn with_from_beginning(mut self, from_beginning: bool) -> Self {
        self.from_beginning = from_beginning;
        self
    }

    /// Sets explicit per-partition start offsets.
    pub fn with_offsets(mut self, offsets: Vec<PartitionOffset>) -> Self {
        self.offsets = offsets;
        self
    }

    /// Requests the N most recent messages.
    pub fn with_tail(mut self, tail: usize) -> Self {
        self.tail = Some(tail);
        self
    }

    /// Stops once the newest offsets at request time are reached.
    pub fn with_exit(mut self, exit: bool) -> Self {
        self.exit = exit;
        self
    }

    /// Sets the idle window used by bounded runs.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Checks flag combinations. Performs no network access.
    ///
    /// # Errors
    ///
    /// Returns `ConsumeError::Config` when `exit` is requested without a start
    /// position, when `tail` is combined with explicit offsets, or when
    /// `tail` is zero.
    pub fn validate(&self) -> Result<(), ConsumeError> {
        if self.exit && !self.from_beginning && self.offsets.is_empty() {
            return Err(ConsumeError::Config(
                "--exit requires --from-beginning or --offset".to_string(),
            ));
        }

        match self.tail {
            Some(0) => {
                return Err(ConsumeError::Config(
                    "--tail must be greater than 0".to_string(),
                ))
            }
            Some(_) if !self.offsets.is_empty() => {
                return Err(ConsumeError::Config(
                    "--tail and --offset cannot be used together".to_string(),
                ))
            }
            _ => {}
        }

        if self.topic.is_empty() {
            return Err(ConsumeError::Config("topic cannot be empty".to_string()));
        }

        Ok(())
    }

    /// True when every partition has a finite end (tail or exit mode).
    pub fn is_bounded(&self) -> bool {
        self.exit || self.tail.is_some()
    }

    /// Returns the explicit offset requested for `partition`, if any.
    ///
    /// When a partition is listed more than once the last entry wins.
    pub fn offset_for(&self, partition: i32) -> Option<OffsetSpec> {
        self.offsets
            .iter()
            .rev()
            .find(|entry| entry.partition == partition)
            .map(|entry| entry.offset)
    }
}
