//! Reconciler
//!
//! Merges terminal outcomes into the row cache and drives the per-tab
//! write-back. Success outcomes carry produced fields; permanent failures
//! mark the row terminally done with the error recorded, so a dead
//! endpoint is never retried forever. Exhausted and skipped items leave
//! the row untouched and eligible for a future run.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheError, RowCache};
use crate::domain::entities::{FieldPatch, LeadPatch, SourcePatch, SourceStatus, Tab};
use crate::domain::events::ItemStatus;
use crate::engine::item::Outcome;

/// Result of the post-batch write-back, one entry per affected tab.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlushReport {
    /// Rows successfully written across all tabs.
    pub rows_written: usize,
    /// Per-tab write failures; the named rows stay dirty for a later
    /// flush.
    pub failures: Vec<FlushFailure>,
}

/// One tab's failed write-back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushFailure {
    pub tab: Tab,
    pub failed_rows: usize,
    pub error: String,
}

impl FlushReport {
    /// Whether every dirty row reached the external store.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies outcomes to the cache and flushes affected tabs.
pub struct Reconciler {
    cache: Arc<RowCache>,
}

impl Reconciler {
    /// Creates a reconciler over a shared cache.
    pub fn new(cache: Arc<RowCache>) -> Self {
        Self { cache }
    }

    /// Applies one terminal outcome to the cache.
    ///
    /// Returns the tabs it touched so the caller can flush each exactly
    /// once after the whole batch.
    pub async fn apply(&self, tab: Tab, outcome: &Outcome) -> Result<Vec<Tab>, CacheError> {
        let mut touched = Vec::new();
        match outcome.status {
            ItemStatus::Success => {
                if let Some(patch) = &outcome.patch {
                    self.cache.mark_dirty(tab, &outcome.row_id, patch).await?;
                    touched.push(tab);
                }
                for row in &outcome.discovered {
                    let discovered_tab = row.tab();
                    if self.cache.append(discovered_tab, row.clone()).await?
                        && !touched.contains(&discovered_tab)
                    {
                        touched.push(discovered_tab);
                    }
                }
            }
            ItemStatus::PermanentFailure => {
                // Documented policy: a permanently failed row is marked
                // done with the error recorded instead of staying "new"
                // and being retried on every future run.
                let error = outcome.error.clone().unwrap_or_else(|| "failed".to_string());
                let patch = terminal_failure_patch(tab, &error);
                self.cache.mark_dirty(tab, &outcome.row_id, &patch).await?;
                touched.push(tab);
            }
            ItemStatus::TransientFailureExhausted | ItemStatus::Skipped => {
                debug!(
                    "{} left unmarked ({:?}), eligible for a future run",
                    outcome.row_id, outcome.status
                );
            }
        }
        Ok(touched)
    }

    /// Applies a whole batch of outcomes, then flushes each affected tab
    /// once. Write failures are reported, not raised: the in-memory
    /// outcomes are already correct and only the write-back stays
    /// pending.
    pub async fn reconcile(&self, tab: Tab, outcomes: &[Outcome]) -> FlushReport {
        let mut affected = BTreeSet::new();
        for outcome in outcomes {
            match self.apply(tab, outcome).await {
                Ok(touched) => affected.extend(touched),
                Err(cache_error) => {
                    warn!("failed to apply outcome for {}: {}", outcome.row_id, cache_error);
                }
            }
        }

        let mut report = FlushReport::default();
        for tab in affected {
            match self.cache.flush(tab).await {
                Ok(written) => report.rows_written += written,
                Err(cache_error) => {
                    let failed_rows = match &cache_error {
                        CacheError::WriteFailed { failed_row_ids } => failed_row_ids.len(),
                        _ => 0,
                    };
                    report.failures.push(FlushFailure {
                        tab,
                        failed_rows,
                        error: cache_error.to_string(),
                    });
                }
            }
        }
        report
    }
}

/// Terminal sentinel for a permanently failed row: done flag set, error
/// recorded in the free-text field.
fn terminal_failure_patch(tab: Tab, error: &str) -> FieldPatch {
    match tab {
        Tab::Sources => FieldPatch::Source(SourcePatch {
            status: Some(SourceStatus::Checked),
            leads_found: Some(0),
            annotation: Some(format!("Error: {error}")),
            ..Default::default()
        }),
        Tab::Leads => FieldPatch::Lead(LeadPatch {
            checked: Some(true),
            annotation: Some(format!("Error: {error}")),
            ..Default::default()
        }),
        Tab::Searches => FieldPatch::Search(Default::default()),
    }
}
