//! Batch processing engine
//!
//! The engine tree: failure classification, retry policy, per-item
//! outcomes, progress sinks, the item processors, and the batch
//! orchestrator that ties them together.

pub mod batch;
pub mod classifier;
pub mod item;
pub mod processors;
pub mod progress;
pub mod retry;

pub use batch::BatchEngine;
pub use classifier::{AttemptClassifier, Classification, classify};
pub use item::{BatchResult, Outcome};
pub use processors::{
    EmailDrafter, ItemProcessor, ItemYield, LeadChecker, ProcessorError, SearchRunner,
    SourceChecker,
};
pub use progress::{ChannelProgress, NullProgress, ProgressSink, TracingProgress};
pub use retry::{BackoffState, RetryPolicy};
