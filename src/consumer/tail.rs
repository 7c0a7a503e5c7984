//! Bounded window of the most recent messages by timestamp.
//!
//! Messages are kept in a vector ordered by timestamp, newest first. Insert
//! uses a binary search for the first strictly older element, so messages
//! with equal timestamps stay in arrival order. Whenever the window grows
//! past its capacity the oldest message is dropped. Messages without a
//! timestamp sort as the oldest possible.

use chrono::{DateTime, Utc};

use super::message::ConsumedMessage;

#[derive(Debug)]
struct Entry {
    arrival: u64,
    message: ConsumedMessage,
}

impl Entry {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.message.timestamp
    }
}

/// The N most recent messages seen across all partitions.
///
/// # Example
///
/// ```rust
/// use kaftail::consumer::{ConsumedMessage, TailWindow};
///
/// let mut window = TailWindow::new(2);
/// for (offset, millis) in [(0, 3_000), (1, 1_000), (2, 2_000)] {
///     window.insert(ConsumedMessage::new(0, offset).with_timestamp_millis(millis));
/// }
///
/// let offsets: Vec<i64> = window.into_ascending().iter().map(|m| m.offset).collect();
/// assert_eq!(offsets, vec![2, 0]);
/// ```
#[derive(Debug)]
pub struct TailWindow {
    capacity: usize,
    arrivals: u64,
    entries: Vec<Entry>,
}

impl TailWindow {
    /// Creates an empty window holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            arrivals: 0,
            entries: Vec::with_capacity(capacity.saturating_add(1).min(4096)),
        }
    }

    /// Maximum number of retained messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no message is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a message, evicting the oldest one if the window is full.
    pub fn insert(&mut self, message: ConsumedMessage) {
        let entry = Entry {
            arrival: self.arrivals,
            message,
        };
        self.arrivals += 1;

        let timestamp = entry.timestamp();
        let position = self
            .entries
            .partition_point(|existing| existing.timestamp() >= timestamp);
        self.entries.insert(position, entry);
        self.entries.truncate(self.capacity);
    }

    /// Retained messages, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ConsumedMessage> {
        self.entries.iter().map(|entry| &entry.message)
    }

    /// Consumes the window, returning messages oldest first.
    ///
    /// Messages with equal timestamps come out in arrival order.
    pub fn into_ascending(self) -> Vec<ConsumedMessage> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| {
            a.timestamp()
                .cmp(&b.timestamp())
                .then(a.arrival.cmp(&b.arrival))
        });
        entries.into_iter().map(|entry| entry.message).collect()
    }
}
