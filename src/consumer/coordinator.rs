//! Shutdown and first-error coordination.
//!
//! A consumption run shares one [`Coordinator`] between its partition
//! workers, the output pipeline and the signal listener. It carries two
//! one-shot states:
//!
//! - **closing**: a [`CancellationToken`] that, once cancelled, stays
//!   cancelled. Workers and the pipeline watch it cooperatively.
//! - **first error**: a single slot. The first recorded error is kept and
//!   becomes the result of the run; later ones are logged and dropped.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::ConsumeError;

/// Shared shutdown flag and first-error slot of one consumption run.
///
/// # Example
///
/// ```rust
/// use kaftail::consumer::{ConsumeError, Coordinator};
///
/// let coordinator = Coordinator::new();
/// assert!(coordinator.record(ConsumeError::Kafka("first".to_string())));
/// assert!(!coordinator.record(ConsumeError::Kafka("second".to_string())));
///
/// let err = coordinator.take_error().unwrap();
/// assert_eq!(err.to_string(), "Kafka error: first");
/// ```
#[derive(Debug, Default)]
pub struct Coordinator {
    closing: CancellationToken,
    first_error: Mutex<Option<ConsumeError>>,
}

impl Coordinator {
    /// Creates a coordinator in the running state with no error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token that is cancelled once shutdown is requested.
    pub fn closing_token(&self) -> CancellationToken {
        self.closing.clone()
    }

    /// Requests a cooperative shutdown. Idempotent.
    pub fn shutdown(&self) {
        if !self.closing.is_cancelled() {
            debug!("Shutdown requested");
        }
        self.closing.cancel();
    }

    /// True once shutdown has been requested.
    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Records an error.
    ///
    /// Returns true if this error is the first one of the run. Any later
    /// error is logged at warn level and discarded.
    pub fn record(&self, error: ConsumeError) -> bool {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if slot.is_some() {
            warn!(error = %error, "Discarding error after the first failure");
            return false;
        }

        debug!(error = %error, "Recorded first error");
        *slot = Some(error);
        true
    }

    /// True if an error has been recorded.
    pub fn has_error(&self) -> bool {
        self.first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Removes and returns the recorded error.
    pub fn take_error(&self) -> Option<ConsumeError> {
        self.first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Spawns a task that requests shutdown on SIGINT or SIGTERM.
    ///
    /// The task ends by itself once shutdown is requested for any other
    /// reason.
    pub fn spawn_signal_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let closing = coordinator.closing_token();
            tokio::select! {
                _ = closing.cancelled() => {}
                signal = wait_for_signal() => {
                    match signal {
                        Ok(name) => info!(signal = name, "Received signal, shutting down"),
                        Err(e) => {
                            warn!(error = %e, "Failed to listen for signals");
                            return;
                        }
                    }
                    coordinator.shutdown();
                }
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "Ctrl-C")
}
