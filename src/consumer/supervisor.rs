//! Partition reader supervision.
//!
//! The [`Supervisor`] owns one worker per partition and feeds every message
//! into the funnel, a single-slot channel drained by the output pipeline.
//! It works in two phases:
//!
//! 1. Open a reader for every partition that has something to read. Empty
//!    bounds are skipped and open failures are recorded with the
//!    [`Coordinator`]; those partitions produce nothing.
//! 2. Run one consumption loop per opened reader and wait for all of them.
//!
//! The funnel sender is dropped only after phase 2, so the pipeline sees the
//! channel close exactly when every worker has stopped producing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info_span, warn, Instrument};

use super::client::{PartitionClient, PartitionReader};
use super::coordinator::Coordinator;
use super::error::ConsumeError;
use super::message::ConsumedMessage;
use super::offsets::OffsetBound;

/// Capacity of the funnel between workers and the output pipeline.
///
/// A single slot keeps every worker in lockstep with the pipeline.
pub const FUNNEL_CAPACITY: usize = 1;

/// Why a partition worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last offset of the bound was emitted.
    BoundaryReached,
    /// No message arrived within the idle window of a bounded run.
    Idle,
    /// Shutdown was requested.
    Shutdown,
    /// The reader's stream ended.
    Exhausted,
    /// The reader failed; the error went to the coordinator.
    ReaderFailed,
    /// The output pipeline stopped accepting messages.
    FunnelClosed,
}

/// Starts and joins the partition workers of one run.
pub struct Supervisor {
    client: Arc<dyn PartitionClient>,
    topic: String,
    idle_timeout: Option<Duration>,
    coordinator: Arc<Coordinator>,
}

impl Supervisor {
    /// Creates a supervisor.
    ///
    /// `idle_timeout` is only set for bounded runs (tail or exit); unbounded
    /// runs wait for messages indefinitely.
    pub fn new(
        client: Arc<dyn PartitionClient>,
        topic: &str,
        idle_timeout: Option<Duration>,
        coordinator: Arc<Coordinator>,
    ) -> Self {
        Self {
            client,
            topic: topic.to_string(),
            idle_timeout,
            coordinator,
        }
    }

    /// Runs every partition to completion, then closes the funnel.
    ///
    /// Returns the stop reason of every worker that ran, ordered by
    /// partition.
    pub async fn run(
        self,
        bounds: Vec<OffsetBound>,
        funnel: mpsc::Sender<ConsumedMessage>,
    ) -> Vec<(i32, StopReason)> {
        let readers = self.open_readers(bounds).await;

        let mut workers = JoinSet::new();
        for (bound, reader) in readers {
            let worker = PartitionWorker {
                bound,
                reader,
                funnel: funnel.clone(),
                idle_timeout: self.idle_timeout,
                coordinator: Arc::clone(&self.coordinator),
            };
            let span = info_span!("partition", partition = bound.partition);
            workers.spawn(
                async move { (bound.partition, worker.run().await) }.instrument(span),
            );
        }
        drop(funnel);

        let mut stops = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stop) => stops.push(stop),
                Err(e) => {
                    self.coordinator.record(ConsumeError::Worker(e.to_string()));
                }
            }
        }

        stops.sort_by_key(|(partition, _)| *partition);
        debug!(workers = stops.len(), "All partition workers stopped");
        stops
    }

    async fn open_readers(
        &self,
        bounds: Vec<OffsetBound>,
    ) -> Vec<(OffsetBound, Box<dyn PartitionReader>)> {
        let mut opening = JoinSet::new();
        for bound in bounds {
            if bound.is_empty() {
                debug!(%bound, "Nothing to read, skipping partition");
                continue;
            }

            let client = Arc::clone(&self.client);
            let topic = self.topic.clone();
            opening.spawn(async move {
                let reader = client.open_reader(&topic, bound.partition, bound.start).await;
                (bound, reader)
            });
        }

        let mut readers = Vec::new();
        while let Some(joined) = opening.join_next().await {
            match joined {
                Ok((bound, Ok(reader))) => {
                    debug!(%bound, "Partition reader started");
                    readers.push((bound, reader));
                }
                Ok((bound, Err(e))) => {
                    warn!(partition = bound.partition, error = %e, "Failed to start partition reader");
                    self.coordinator.record(e);
                }
                Err(e) => {
                    self.coordinator.record(ConsumeError::Worker(e.to_string()));
                }
            }
        }

        readers.sort_by_key(|(bound, _)| bound.partition);
        readers
    }
}

enum Next {
    Message(ConsumedMessage),
    Idle,
    Exhausted,
    Failed(ConsumeError),
}

struct PartitionWorker {
    bound: OffsetBound,
    reader: Box<dyn PartitionReader>,
    funnel: mpsc::Sender<ConsumedMessage>,
    idle_timeout: Option<Duration>,
    coordinator: Arc<Coordinator>,
}

impl PartitionWorker {
    async fn run(mut self) -> StopReason {
        let closing = self.coordinator.closing_token();

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = closing.cancelled() => break StopReason::Shutdown,
                next = self.next() => next,
            };

            let message = match next {
                Next::Message(message) => message,
                Next::Idle => {
                    // Some brokers never deliver the last offset of a
                    // compacted or transactional log, so a quiet partition
                    // is treated as caught up.
                    warn!(
                        partition = self.bound.partition,
                        idle_secs = self.idle_timeout.map(|d| d.as_secs_f64()),
                        "No messages within the idle timeout, assuming partition is caught up"
                    );
                    break StopReason::Idle;
                }
                Next::Exhausted => break StopReason::Exhausted,
                Next::Failed(e) => {
                    self.coordinator.record(e);
                    break StopReason::ReaderFailed;
                }
            };

            let offset = message.offset;
            let sent = tokio::select! {
                biased;
                _ = closing.cancelled() => break StopReason::Shutdown,
                sent = self.funnel.send(message) => sent,
            };
            if sent.is_err() {
                break StopReason::FunnelClosed;
            }

            if self.bound.reached_by(offset) {
                break StopReason::BoundaryReached;
            }
        };

        debug!(partition = self.bound.partition, ?reason, "Partition worker stopped");
        self.reader.close();
        reason
    }

    async fn next(&mut self) -> Next {
        let received = match self.idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, self.reader.recv()).await {
                Ok(received) => received,
                Err(_) => return Next::Idle,
            },
            None => self.reader.recv().await,
        };

        match received {
            Ok(Some(message)) => Next::Message(message),
            Ok(None) => Next::Exhausted,
            Err(e) => Next::Failed(e),
        }
    }
}
