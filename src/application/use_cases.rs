//! Engine facade
//!
//! `LeadEngine` wires the cache, batch engine, processors, and reconciler
//! together behind the three calls the web layer uses: run a batch,
//! inspect cache state, refresh the cache. All collaborators are injected
//! at construction; the facade owns no global state.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::dto::{BatchOperation, BatchOptions, BatchRequest, BatchSummary};
use crate::cache::{CacheError, CacheStatus, RowCache};
use crate::domain::entities::{RowId, SheetRow, Tab};
use crate::domain::gateways::{EmailService, Fetcher, SheetStore, TextExtractor};
use crate::engine::batch::BatchEngine;
use crate::engine::processors::{
    EmailDrafter, ItemProcessor, LeadChecker, SearchRunner, SourceChecker,
};
use crate::engine::progress::TracingProgress;
use crate::engine::retry::RetryPolicy;
use crate::infrastructure::config::EngineConfig;
use crate::reconcile::Reconciler;

/// Failure of a facade call.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The sheet could not be read and no cached copy exists; no items
    /// could be resolved, so the batch never started.
    #[error("sheet source unavailable: {0}")]
    SourceUnavailable(String),
}

impl From<CacheError> for EngineError {
    fn from(error: CacheError) -> Self {
        EngineError::SourceUnavailable(error.to_string())
    }
}

/// The batch processing engine as exposed to the calling layer.
pub struct LeadEngine {
    config: EngineConfig,
    cache: Arc<RowCache>,
    reconciler: Reconciler,
    source_checker: Arc<dyn ItemProcessor>,
    lead_checker: Arc<dyn ItemProcessor>,
    email_drafter: Arc<dyn ItemProcessor>,
    search_runner: Arc<dyn ItemProcessor>,
}

impl LeadEngine {
    /// Wires an engine over injected collaborators.
    pub fn new(
        store: Arc<dyn SheetStore>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn TextExtractor>,
        email_service: Arc<dyn EmailService>,
        config: EngineConfig,
    ) -> Self {
        let cache = Arc::new(RowCache::new(store, config.cache_ttl()));
        let reconciler = Reconciler::new(Arc::clone(&cache));
        let source_checker: Arc<dyn ItemProcessor> = Arc::new(SourceChecker::new(
            Arc::clone(&fetcher),
            Arc::clone(&extractor),
        ));
        let lead_checker: Arc<dyn ItemProcessor> = Arc::new(LeadChecker::new(
            Arc::clone(&fetcher),
            Arc::clone(&extractor),
            config.search.max_lead_subpages,
        ));
        let email_drafter: Arc<dyn ItemProcessor> = Arc::new(EmailDrafter::new(
            Arc::clone(&extractor),
            email_service,
            config.email.from_address.clone(),
        ));
        let search_runner: Arc<dyn ItemProcessor> = Arc::new(SearchRunner::new(
            fetcher,
            extractor,
            config.search.url_template.clone(),
        ));

        Self {
            config,
            cache,
            reconciler,
            source_checker,
            lead_checker,
            email_drafter,
            search_runner,
        }
    }

    /// Runs one batch to completion and returns its summary.
    ///
    /// Per-item failures never abort the batch; only an unreadable sheet
    /// before any item starts does.
    pub async fn run_batch(&self, request: BatchRequest) -> Result<BatchSummary, EngineError> {
        let operation = request.operation;
        let tab = operation.tab();

        let rows = match self.cache.get(tab).await {
            Ok(rows) => rows,
            Err(CacheError::SourceUnavailable(detail)) => {
                return Err(EngineError::SourceUnavailable(detail));
            }
            Err(other) => return Err(other.into()),
        };
        let selected = select_rows(rows, &request.row_ids, operation);
        info!(
            "Starting {} over {} row(s) (requested: {})",
            operation,
            selected.len(),
            if request.row_ids.is_empty() {
                "all eligible".to_string()
            } else {
                request.row_ids.len().to_string()
            }
        );

        let engine = self.engine_for(&request.options);
        let progress = request
            .progress
            .unwrap_or_else(|| Arc::new(TracingProgress));
        let cancel = request.cancel.unwrap_or_default();
        let processor = self.processor_for(operation);

        let result = engine
            .run(operation.as_str(), selected, processor, progress, cancel)
            .await;
        let flush = self.reconciler.reconcile(tab, &result.per_item).await;
        if !flush.is_clean() {
            warn!(
                "{} write-back incomplete: {} tab(s) failed",
                operation,
                flush.failures.len()
            );
        }

        Ok(BatchSummary {
            batch: result,
            flush,
        })
    }

    /// Cache state for one tab.
    pub async fn cache_status(&self, tab: Tab) -> CacheStatus {
        self.cache.status(tab).await
    }

    /// Forces a reload of one tab, or of all tabs.
    pub async fn refresh_cache(&self, tab: Option<Tab>) -> Result<(), EngineError> {
        match tab {
            Some(tab) => self.cache.refresh(tab).await?,
            None => self.cache.refresh_all().await?,
        }
        Ok(())
    }

    /// The shared row cache, for callers that flush or inspect directly.
    #[must_use]
    pub fn cache(&self) -> Arc<RowCache> {
        Arc::clone(&self.cache)
    }

    fn engine_for(&self, options: &BatchOptions) -> BatchEngine {
        BatchEngine::with_limits(
            options
                .concurrency_limit
                .unwrap_or(self.config.batch.concurrency_limit),
            options.item_timeout.unwrap_or_else(|| self.config.item_timeout()),
            RetryPolicy::from_config(&self.config.retry),
        )
    }

    fn processor_for(&self, operation: BatchOperation) -> Arc<dyn ItemProcessor> {
        match operation {
            BatchOperation::CheckSources => Arc::clone(&self.source_checker),
            BatchOperation::CheckLeads => Arc::clone(&self.lead_checker),
            BatchOperation::SendEmails => Arc::clone(&self.email_drafter),
            BatchOperation::RunSearches => Arc::clone(&self.search_runner),
        }
    }
}

/// Resolves the requested rows, in request order.
///
/// An empty id list selects every not-yet-done row. Explicitly requested
/// rows that are already done are dropped with a warning: done flags are
/// monotonic and the engine never redoes them. Unknown ids are dropped
/// with a warning as well.
fn select_rows(rows: Vec<SheetRow>, row_ids: &[RowId], operation: BatchOperation) -> Vec<SheetRow> {
    if row_ids.is_empty() {
        return rows
            .into_iter()
            .filter(|row| !operation.is_done(row))
            .collect();
    }

    let mut selected = Vec::with_capacity(row_ids.len());
    for row_id in row_ids {
        match rows.iter().find(|row| &row.id() == row_id) {
            Some(row) if operation.is_done(row) => {
                warn!("{}: '{}' already done, dropped from batch", operation, row_id);
            }
            Some(row) => selected.push(row.clone()),
            None => {
                warn!("{}: unknown row '{}', dropped from batch", operation, row_id);
            }
        }
    }
    selected
}
