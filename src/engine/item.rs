//! Per-item outcomes and batch aggregation
//!
//! An `Outcome` is the single terminal record for one item within one
//! batch run; a `BatchResult` aggregates them in input order for the
//! caller. Both are immutable once produced and owned by the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{FieldPatch, RowId, SheetRow};
use crate::domain::events::{BatchId, ItemStatus};

/// Terminal result for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Identity of the processed row.
    pub row_id: RowId,

    /// Terminal status.
    pub status: ItemStatus,

    /// Fields produced for the row itself; `None` for failures and skips.
    pub patch: Option<FieldPatch>,

    /// Rows the operation discovered for other tabs (new leads, new
    /// sources), appended at reconcile time.
    pub discovered: Vec<SheetRow>,

    /// Human-readable error for non-success outcomes.
    pub error: Option<String>,

    /// Attempts made, including the first.
    pub attempts: u32,

    /// Wall-clock time spent on this item, including backoff sleeps.
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl Outcome {
    /// A successful outcome with produced fields.
    #[must_use]
    pub fn success(
        row_id: RowId,
        patch: FieldPatch,
        discovered: Vec<SheetRow>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            row_id,
            status: ItemStatus::Success,
            patch: Some(patch),
            discovered,
            error: None,
            attempts,
            elapsed,
        }
    }

    /// A failure retrying will never fix.
    #[must_use]
    pub fn permanent_failure(
        row_id: RowId,
        error: String,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            row_id,
            status: ItemStatus::PermanentFailure,
            patch: None,
            discovered: Vec::new(),
            error: Some(error),
            attempts,
            elapsed,
        }
    }

    /// A recoverable failure that ran out of attempts.
    #[must_use]
    pub fn exhausted(row_id: RowId, error: String, attempts: u32, elapsed: Duration) -> Self {
        Self {
            row_id,
            status: ItemStatus::TransientFailureExhausted,
            patch: None,
            discovered: Vec::new(),
            error: Some(error),
            attempts,
            elapsed,
        }
    }

    /// An item cancellation reached before it started.
    #[must_use]
    pub fn skipped(row_id: RowId) -> Self {
        Self {
            row_id,
            status: ItemStatus::Skipped,
            patch: None,
            discovered: Vec::new(),
            error: None,
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Aggregate result of one batch run, `per_item` in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: BatchId,
    pub total: usize,
    pub succeeded: usize,
    pub permanently_failed: usize,
    pub exhausted: usize,
    pub skipped: usize,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub per_item: Vec<Outcome>,
}

impl BatchResult {
    /// Aggregates outcomes already ordered to match the batch input.
    #[must_use]
    pub fn from_outcomes(batch_id: BatchId, per_item: Vec<Outcome>, elapsed: Duration) -> Self {
        let mut succeeded = 0;
        let mut permanently_failed = 0;
        let mut exhausted = 0;
        let mut skipped = 0;
        for outcome in &per_item {
            match outcome.status {
                ItemStatus::Success => succeeded += 1,
                ItemStatus::PermanentFailure => permanently_failed += 1,
                ItemStatus::TransientFailureExhausted => exhausted += 1,
                ItemStatus::Skipped => skipped += 1,
            }
        }

        Self {
            batch_id,
            total: per_item.len(),
            succeeded,
            permanently_failed,
            exhausted,
            skipped,
            elapsed,
            per_item,
        }
    }
}

/// Serializes `Duration` as integer milliseconds, matching the sheet
/// layer's elapsed-time columns.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
