//! Progress reporting
//!
//! Sinks receive batch events as they happen, enabling live progress bars
//! in the calling layer. Reporting is synchronous and must be cheap; slow
//! consumers should buffer behind a channel.

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::events::BatchEvent;

/// Receives batch lifecycle events as they occur.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &BatchEvent);
}

/// Discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _event: &BatchEvent) {}
}

/// Logs events through the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Started {
                batch_id,
                operation,
                total,
            } => {
                info!("Batch {} started: {} ({} items)", batch_id, operation, total);
            }
            BatchEvent::ItemCompleted {
                row_id,
                status,
                attempts,
                error,
                ..
            } => match error {
                Some(error) => {
                    warn!("{} -> {:?} after {} attempt(s): {}", row_id, status, attempts, error);
                }
                None => {
                    info!("{} -> {:?} after {} attempt(s)", row_id, status, attempts);
                }
            },
            BatchEvent::Completed {
                batch_id,
                succeeded,
                permanently_failed,
                exhausted,
                skipped,
                elapsed_ms,
            } => {
                info!(
                    "Batch {} completed in {}ms: {} ok, {} permanent, {} exhausted, {} skipped",
                    batch_id, elapsed_ms, succeeded, permanently_failed, exhausted, skipped
                );
            }
        }
    }
}

/// Forwards events into an unbounded channel, for UIs and tests that
/// consume progress asynchronously.
#[derive(Debug)]
pub struct ChannelProgress {
    sender: mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelProgress {
    /// Creates a sink and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BatchEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: &BatchEvent) {
        // A dropped receiver just means nobody is watching anymore.
        let _ = self.sender.send(event.clone());
    }
}
