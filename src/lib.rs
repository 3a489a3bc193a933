//! Leadflow - Batch Enrichment Engine for Spreadsheet-Backed Lead Generation
//!
//! This crate implements the batch processing engine behind a lead
//! generation tool: an in-memory mirror of the spreadsheet of record,
//! bounded-concurrency batches of per-row operations against unreliable
//! external endpoints, permanent/transient failure classification with
//! bounded retries, and reconciliation of outcomes back into the sheet.

// Module declarations
pub mod application;
pub mod cache;
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod reconcile;

// Re-export the facade and the types callers need alongside it
pub use application::{BatchOperation, BatchOptions, BatchRequest, BatchSummary, EngineError, LeadEngine};
pub use cache::{CacheError, CacheStatus, RowCache};
pub use domain::entities::{
    FieldPatch, LeadPatch, LeadRow, RowId, SearchPatch, SearchRow, SearchStatus, SheetRow,
    SourcePatch, SourceRow, SourceStatus, Tab,
};
pub use domain::events::{BatchEvent, BatchId, ItemStatus};
pub use domain::gateways::{
    EmailDraft, EmailService, FailureKind, FetchedPage, Fetcher, SheetStore, StoreError,
    TextExtractor,
};
pub use engine::{
    BatchEngine, BatchResult, ChannelProgress, ItemProcessor, NullProgress, Outcome, ProgressSink,
    TracingProgress,
};
pub use infrastructure::{ConfigManager, EngineConfig, HttpFetcher, init_logging};
pub use reconcile::{FlushReport, Reconciler};
