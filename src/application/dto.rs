//! Data transfer objects for the engine facade
//!
//! The request/response types the calling (web) layer exchanges with the
//! engine. Nothing here leaks engine internals beyond the typed outcome
//! and flush structures the caller needs for reporting.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::entities::{RowId, SearchStatus, SheetRow, SourceStatus, Tab};
use crate::engine::item::BatchResult;
use crate::engine::progress::ProgressSink;
use crate::reconcile::FlushReport;

/// The batch operations the engine exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOperation {
    CheckSources,
    CheckLeads,
    SendEmails,
    RunSearches,
}

impl BatchOperation {
    /// The tab this operation processes rows from.
    #[must_use]
    pub fn tab(&self) -> Tab {
        match self {
            BatchOperation::CheckSources => Tab::Sources,
            BatchOperation::CheckLeads | BatchOperation::SendEmails => Tab::Leads,
            BatchOperation::RunSearches => Tab::Searches,
        }
    }

    /// Stable operation name for logs and events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BatchOperation::CheckSources => "check_sources",
            BatchOperation::CheckLeads => "check_leads",
            BatchOperation::SendEmails => "send_emails",
            BatchOperation::RunSearches => "run_searches",
        }
    }

    /// Whether the row already carries this operation's done flag.
    ///
    /// Done flags are monotonic; done rows are excluded from batches so
    /// the engine never redoes or reverts them.
    #[must_use]
    pub fn is_done(&self, row: &SheetRow) -> bool {
        match (self, row) {
            (BatchOperation::CheckSources, SheetRow::Source(source)) => {
                source.status == SourceStatus::Checked
            }
            (BatchOperation::CheckLeads, SheetRow::Lead(lead)) => lead.checked,
            (BatchOperation::SendEmails, SheetRow::Lead(lead)) => lead.emailed,
            (BatchOperation::RunSearches, SheetRow::Search(search)) => {
                search.returns == SearchStatus::Completed
            }
            _ => false,
        }
    }
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-batch overrides of the configured limits.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Worker pool size for this batch.
    pub concurrency_limit: Option<usize>,
    /// Per-attempt timeout for this batch.
    pub item_timeout: Option<Duration>,
}

/// A batch request: operation, row selection, and optional hooks.
///
/// An empty `row_ids` selects every not-yet-done row of the operation's
/// tab, matching the "process everything new" buttons in the surrounding
/// product.
pub struct BatchRequest {
    pub operation: BatchOperation,
    pub row_ids: Vec<RowId>,
    pub options: BatchOptions,
    pub progress: Option<Arc<dyn ProgressSink>>,
    pub cancel: Option<CancellationToken>,
}

impl BatchRequest {
    /// A request over all eligible rows with default options.
    #[must_use]
    pub fn new(operation: BatchOperation) -> Self {
        Self {
            operation,
            row_ids: Vec::new(),
            options: BatchOptions::default(),
            progress: None,
            cancel: None,
        }
    }

    /// Restricts the batch to the given rows, processed in this order.
    #[must_use]
    pub fn with_rows(mut self, row_ids: Vec<RowId>) -> Self {
        self.row_ids = row_ids;
        self
    }

    /// Overrides configured limits for this batch.
    #[must_use]
    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Everything a caller gets back from one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Aggregate outcome counts and the per-item results in input order.
    pub batch: BatchResult,
    /// Write-back result; failures here leave rows dirty for a later
    /// flush without invalidating the outcomes.
    pub flush: FlushReport,
}
