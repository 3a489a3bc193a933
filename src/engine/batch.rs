//! Batch engine
//!
//! Orchestrates one processor over a list of rows: bounded concurrency
//! via semaphore permits, a per-item retry loop driven by the classifier
//! and retry policy, immediate progress reporting, and graceful
//! cancellation. One item's backoff sleeps never stall the others, and
//! per-item failures never abort the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::entities::SheetRow;
use crate::domain::events::{BatchEvent, BatchId};
use crate::domain::gateways::FailureKind;
use crate::engine::classifier::{AttemptClassifier, Classification};
use crate::engine::item::{BatchResult, Outcome};
use crate::engine::processors::ItemProcessor;
use crate::engine::progress::ProgressSink;
use crate::engine::retry::{BackoffState, RetryPolicy};
use crate::infrastructure::config::EngineConfig;

/// Runs batches of per-item operations with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchEngine {
    concurrency_limit: usize,
    item_timeout: Duration,
    policy: RetryPolicy,
}

impl BatchEngine {
    /// Builds an engine from configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            concurrency_limit: config.batch.concurrency_limit.max(1),
            item_timeout: config.item_timeout(),
            policy: RetryPolicy::from_config(&config.retry),
        }
    }

    /// Builds an engine with explicit limits, overriding configuration.
    #[must_use]
    pub fn with_limits(
        concurrency_limit: usize,
        item_timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
            item_timeout,
            policy,
        }
    }

    /// Runs `processor` over `rows`.
    ///
    /// Returns once every row has a terminal outcome. `per_item` follows
    /// the input order regardless of completion order. Cancellation stops
    /// new rows from starting; rows already in flight finish normally and
    /// unstarted rows come back `Skipped`.
    pub async fn run(
        &self,
        operation: &str,
        rows: Vec<SheetRow>,
        processor: Arc<dyn ItemProcessor>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> BatchResult {
        let batch_id = BatchId::new();
        let started = Instant::now();
        progress.report(&BatchEvent::Started {
            batch_id,
            operation: operation.to_string(),
            total: rows.len(),
        });

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut handles = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let row_id = row.id();
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&processor);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            let policy = self.policy.clone();
            let item_timeout = self.item_timeout;

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, Outcome::skipped(row.id())),
                };

                // Cancellation is only honored before a row starts; an
                // in-flight attempt runs to completion or its own timeout.
                let outcome = if cancel.is_cancelled() {
                    Outcome::skipped(row.id())
                } else {
                    process_item(&policy, item_timeout, processor.as_ref(), &row, &cancel).await
                };

                progress.report(&BatchEvent::ItemCompleted {
                    batch_id,
                    row_id: outcome.row_id.clone(),
                    status: outcome.status,
                    attempts: outcome.attempts,
                    elapsed_ms: outcome.elapsed.as_millis() as u64,
                    error: outcome.error.clone(),
                });
                (index, outcome)
            });
            handles.push((index, row_id, handle));
        }

        let mut indexed = futures::future::join_all(handles.into_iter().map(
            |(index, row_id, handle)| async move {
                match handle.await {
                    Ok(pair) => pair,
                    Err(join_error) => {
                        warn!("worker for {} aborted: {}", row_id, join_error);
                        let outcome = Outcome::permanent_failure(
                            row_id,
                            format!("worker aborted: {join_error}"),
                            0,
                            Duration::ZERO,
                        );
                        (index, outcome)
                    }
                }
            },
        ))
        .await;
        indexed.sort_by_key(|(index, _)| *index);
        let per_item: Vec<Outcome> = indexed.into_iter().map(|(_, outcome)| outcome).collect();

        let result = BatchResult::from_outcomes(batch_id, per_item, started.elapsed());
        progress.report(&BatchEvent::Completed {
            batch_id,
            succeeded: result.succeeded,
            permanently_failed: result.permanently_failed,
            exhausted: result.exhausted,
            skipped: result.skipped,
            elapsed_ms: result.elapsed.as_millis() as u64,
        });
        result
    }
}

/// One item's retry loop: attempt, classify, back off, repeat until a
/// terminal outcome.
async fn process_item(
    policy: &RetryPolicy,
    item_timeout: Duration,
    processor: &dyn ItemProcessor,
    row: &SheetRow,
    cancel: &CancellationToken,
) -> Outcome {
    let row_id = row.id();
    let started = Instant::now();
    let mut classifier = AttemptClassifier::new();
    let mut backoff = BackoffState::default();

    loop {
        backoff.attempts += 1;
        let failure = match timeout(item_timeout, processor.process(row)).await {
            Ok(Ok(yielded)) => {
                return Outcome::success(
                    row_id,
                    yielded.patch,
                    yielded.discovered,
                    backoff.attempts,
                    started.elapsed(),
                );
            }
            Ok(Err(error)) => error.kind,
            Err(_elapsed) => FailureKind::Timeout {
                seconds: item_timeout.as_secs(),
            },
        };

        let classification = classifier.assess(&failure);
        backoff.next_delay = policy.next_delay(classification, &failure, backoff.attempts);
        match backoff.next_delay {
            Some(delay) => {
                debug!(
                    "{} attempt {} failed ({}), retrying in {:?}",
                    row_id, backoff.attempts, failure, delay
                );
                tokio::select! {
                    () = sleep(delay) => {}
                    () = cancel.cancelled() => {
                        return Outcome::exhausted(
                            row_id,
                            format!("cancelled while retrying: {failure}"),
                            backoff.attempts,
                            started.elapsed(),
                        );
                    }
                }
            }
            None => {
                let error = failure.to_string();
                return if classification == Classification::Permanent {
                    Outcome::permanent_failure(row_id, error, backoff.attempts, started.elapsed())
                } else {
                    Outcome::exhausted(row_id, error, backoff.attempts, started.elapsed())
                };
            }
        }
    }
}
