//! Multi-partition consumption engine.
//!
//! A run goes through these stages:
//!
//! - **Offset resolution**: every target partition gets an [`OffsetBound`]
//!   computed from the [`ConsumptionRequest`] before any reader is opened.
//! - **Supervision**: the [`Supervisor`] runs one worker per non-empty bound.
//!   Workers push messages into a single-slot funnel and stop at their
//!   boundary, after an idle window in bounded modes, or on shutdown.
//! - **Output**: the [`OutputPipeline`] drains the funnel through the
//!   [`DeserializerChain`](crate::decode::DeserializerChain), either directly
//!   or through a [`TailWindow`] that re-orders the most recent messages by
//!   timestamp.
//! - **Coordination**: the [`Coordinator`] carries the shutdown flag and
//!   keeps the first error, which becomes the result of the run.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kaftail::consumer::{Consumption, ConsumptionRequest, FakeClient};
//! use kaftail::decode::DeserializerChain;
//! use kaftail::output::MemorySink;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kaftail::consumer::ConsumeError> {
//! let client = Arc::new(FakeClient::new().with_partition("events", 0, 10));
//! let request = ConsumptionRequest::new("events").with_tail(3);
//!
//! let mut sink = MemorySink::new();
//! Consumption::new(client, request, DeserializerChain::default())
//!     .run(&mut sink)
//!     .await?;
//!
//! assert_eq!(sink.positions(), vec![(0, 7), (0, 8), (0, 9)]);
//! # Ok(())
//! # }
//! ```
//!
//! # Authentication
//!
//! [`KafkaClientConfig`] translates the security settings into librdkafka
//! properties:
//!
//! - **PLAINTEXT**: No authentication (development only)
//! - **SSL**: TLS encryption without SASL
//! - **SASL_PLAINTEXT**: SASL authentication without TLS
//! - **SASL_SSL**: SASL authentication with TLS
//!
//! SASL mechanisms supported: PLAIN, SCRAM-SHA-256 and SCRAM-SHA-512.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fake;
pub mod kafka;
pub mod message;
pub mod offsets;
pub mod pipeline;
pub mod request;
pub mod supervisor;
pub mod tail;

use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::decode::DeserializerChain;
use crate::output::Sink;

pub use client::{PartitionClient, PartitionReader};
pub use config::{ConfigError, KafkaClientConfig, SaslConfig, SaslMechanism, SecurityProtocol, SslConfig};
pub use coordinator::Coordinator;
pub use error::ConsumeError;
pub use fake::FakeClient;
pub use kafka::KafkaClient;
pub use message::ConsumedMessage;
pub use offsets::{resolve_bound, OffsetBound};
pub use pipeline::{OutputMode, OutputPipeline};
pub use request::{ConsumptionRequest, OffsetSpec, PartitionOffset, DEFAULT_IDLE_TIMEOUT};
pub use supervisor::{StopReason, Supervisor, FUNNEL_CAPACITY};
pub use tail::TailWindow;

/// One consumption run.
pub struct Consumption {
    client: Arc<dyn PartitionClient>,
    request: ConsumptionRequest,
    chain: DeserializerChain,
    coordinator: Arc<Coordinator>,
    handle_signals: bool,
}

impl Consumption {
    /// Creates a run without OS signal handling.
    pub fn new(
        client: Arc<dyn PartitionClient>,
        request: ConsumptionRequest,
        chain: DeserializerChain,
    ) -> Self {
        Self {
            client,
            request,
            chain,
            coordinator: Arc::new(Coordinator::new()),
            handle_signals: false,
        }
    }

    /// Requests shutdown on SIGINT or SIGTERM while the run is active.
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// The coordinator of this run, for programmatic shutdown.
    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Consumes the topic into `sink` until every partition stops.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any network access when the
    /// request is invalid, the first offset query error, the first sink
    /// error, or otherwise the first error recorded during the run.
    pub async fn run(self, sink: &mut dyn Sink) -> Result<(), ConsumeError> {
        let Consumption {
            client,
            request,
            chain,
            coordinator,
            handle_signals,
        } = self;

        request.validate()?;

        let mut partitions = if request.partitions.is_empty() {
            client.list_partitions(&request.topic).await?
        } else {
            request.partitions.clone()
        };
        partitions.sort_unstable();
        partitions.dedup();
        if partitions.is_empty() {
            info!(topic = %request.topic, "Topic has no partitions, nothing to consume");
            return Ok(());
        }

        let bounds = try_join_all(
            partitions
                .iter()
                .map(|partition| resolve_bound(client.as_ref(), &request, *partition)),
        )
        .await?;
        for bound in &bounds {
            debug!(topic = %request.topic, %bound, "Resolved offset bound");
        }

        let listener = handle_signals.then(|| coordinator.spawn_signal_listener());

        let (funnel_tx, funnel_rx) = mpsc::channel(FUNNEL_CAPACITY);
        let idle_timeout = request.is_bounded().then_some(request.idle_timeout);
        let supervisor = Supervisor::new(
            Arc::clone(&client),
            &request.topic,
            idle_timeout,
            Arc::clone(&coordinator),
        );
        let workers = tokio::spawn(supervisor.run(bounds, funnel_tx));

        let mode = match request.tail {
            Some(capacity) => OutputMode::Tail(capacity),
            None => OutputMode::Direct,
        };
        let drained = OutputPipeline::new(&chain, sink, Arc::clone(&coordinator))
            .drain(mode, funnel_rx)
            .await;
        if drained.is_err() {
            coordinator.shutdown();
        }

        if let Err(e) = workers.await {
            coordinator.record(ConsumeError::Worker(e.to_string()));
        }
        coordinator.shutdown();
        if let Some(listener) = listener {
            listener.abort();
        }

        let emitted = drained?;
        info!(topic = %request.topic, emitted, "Consumption finished");

        match coordinator.take_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Consumes a topic with OS signal handling enabled.
///
/// # Errors
///
/// See [`Consumption::run`].
pub async fn consume(
    client: Arc<dyn PartitionClient>,
    request: ConsumptionRequest,
    chain: DeserializerChain,
    sink: &mut dyn Sink,
) -> Result<(), ConsumeError> {
    Consumption::new(client, request, chain)
        .with_signal_handling(true)
        .run(sink)
        .await
}
