//! Item processors
//!
//! One processor per batch operation. A processor performs the single-item
//! side-effecting work (fetch, extract, draft) and returns either produced
//! fields or a classified failure. Processors never touch the row cache;
//! outcomes flow back through the engine to the reconciler.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{FieldPatch, SheetRow, Tab};
use crate::domain::gateways::FailureKind;

pub mod email_drafter;
pub mod lead_checker;
pub mod page;
pub mod search_runner;
pub mod source_checker;

pub use email_drafter::EmailDrafter;
pub use lead_checker::LeadChecker;
pub use search_runner::SearchRunner;
pub use source_checker::SourceChecker;

/// Classified failure of one processing attempt.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct ProcessorError {
    pub kind: FailureKind,
}

impl From<FailureKind> for ProcessorError {
    fn from(kind: FailureKind) -> Self {
        Self { kind }
    }
}

/// Fields produced by a successful attempt.
#[derive(Debug, Clone)]
pub struct ItemYield {
    /// Partial update for the processed row.
    pub patch: FieldPatch,
    /// Rows discovered for other tabs, appended at reconcile time.
    pub discovered: Vec<SheetRow>,
}

impl ItemYield {
    /// A yield with no discoveries.
    #[must_use]
    pub fn patch_only(patch: FieldPatch) -> Self {
        Self {
            patch,
            discovered: Vec::new(),
        }
    }
}

/// A single-item operation the batch engine can run.
///
/// Side effects per attempt are bounded: one outbound fetch, zero-or-one
/// AI call, zero-or-one email-draft call.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Processor identifier for logs and progress events.
    fn name(&self) -> &'static str;

    /// The tab this processor's rows live in.
    fn tab(&self) -> Tab;

    /// Runs the operation for one row.
    async fn process(&self, row: &SheetRow) -> Result<ItemYield, ProcessorError>;
}

/// Shapes the common "wrong row shape" failure.
pub(crate) fn wrong_shape(expected: &str, row: &SheetRow) -> ProcessorError {
    ProcessorError {
        kind: FailureKind::InvalidInput {
            detail: format!("expected a {expected} row, got one from tab '{}'", row.tab()),
        },
    }
}
