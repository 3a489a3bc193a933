//! Batch lifecycle events
//!
//! Event types emitted while a batch runs, consumed by progress sinks
//! (live progress bars in the calling layer, log subscribers in tests).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::RowId;

/// Unique identifier for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Creates a new unique batch ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal status of one item within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The operation completed and produced fields.
    Success,
    /// The failure will never resolve by retrying; the row is marked done
    /// with the error recorded.
    PermanentFailure,
    /// Retries were exhausted on a recoverable failure; the row stays
    /// eligible for a future run.
    TransientFailureExhausted,
    /// Cancellation arrived before the item started.
    Skipped,
}

impl ItemStatus {
    /// Whether this status counts toward the succeeded tally.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ItemStatus::Success)
    }
}

/// Events emitted during a batch run, in occurrence order.
///
/// Item completion order follows actual completion, not input order; only
/// the final aggregated result is reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        batch_id: BatchId,
        operation: String,
        total: usize,
    },
    ItemCompleted {
        batch_id: BatchId,
        row_id: RowId,
        status: ItemStatus,
        attempts: u32,
        elapsed_ms: u64,
        error: Option<String>,
    },
    Completed {
        batch_id: BatchId,
        succeeded: usize,
        permanently_failed: usize,
        exhausted: usize,
        skipped: usize,
        elapsed_ms: u64,
    },
}

impl BatchEvent {
    /// Stable event name for subscribers that route by kind.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            BatchEvent::Started { .. } => "batch-started",
            BatchEvent::ItemCompleted { .. } => "batch-item-completed",
            BatchEvent::Completed { .. } => "batch-completed",
        }
    }
}
