//! Batch engine scenario tests
//!
//! Exercises the retry, ordering, and cancellation behavior of the batch
//! engine against stub processors and stub collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use leadflow::domain::entities::{
    FieldPatch, SearchPatch, SearchRow, SearchStatus, SheetRow, SourceRow, SourceStatus, Tab,
};
use leadflow::domain::gateways::{
    FailureKind, FetchedPage, Fetcher, LeadExtraction, TextExtractor,
};
use leadflow::engine::processors::{ItemProcessor, ItemYield, ProcessorError, SourceChecker};
use leadflow::engine::retry::RetryPolicy;
use leadflow::engine::{BatchEngine, NullProgress};
use leadflow::infrastructure::config::RetryConfig;
use leadflow::{BatchResult, ItemStatus};

fn search_rows(n: usize) -> Vec<SheetRow> {
    (0..n)
        .map(|i| {
            SheetRow::Search(SearchRow {
                date: "2025-11-02".to_string(),
                query: format!("query {i}"),
                returns: SearchStatus::New,
            })
        })
        .collect()
}

fn policy(max_attempts: u32, base_ms: u64, max_ms: u64) -> RetryPolicy {
    RetryPolicy::from_config(&RetryConfig {
        max_attempts,
        backoff_base_ms: base_ms,
        backoff_max_ms: max_ms,
        quota_backoff_base_ms: base_ms,
        backoff_jitter: 0.0,
    })
}

fn engine(concurrency: usize, policy: RetryPolicy) -> BatchEngine {
    BatchEngine::with_limits(concurrency, Duration::from_secs(5), policy)
}

async fn run(engine: &BatchEngine, rows: Vec<SheetRow>, processor: Arc<dyn ItemProcessor>) -> BatchResult {
    engine
        .run(
            "test",
            rows,
            processor,
            Arc::new(NullProgress),
            CancellationToken::new(),
        )
        .await
}

/// Fails every attempt with a fixed failure kind.
struct AlwaysFailing {
    kind: FailureKind,
    attempt_times: Mutex<Vec<Instant>>,
}

impl AlwaysFailing {
    fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            attempt_times: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ItemProcessor for AlwaysFailing {
    fn name(&self) -> &'static str {
        "AlwaysFailing"
    }

    fn tab(&self) -> Tab {
        Tab::Searches
    }

    async fn process(&self, _row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        self.attempt_times.lock().unwrap().push(Instant::now());
        Err(ProcessorError::from(self.kind.clone()))
    }
}

/// Fails transiently a fixed number of times per row, then succeeds.
struct FlakyThenOk {
    failures_before_success: usize,
    calls: Mutex<std::collections::HashMap<String, usize>>,
}

impl FlakyThenOk {
    fn new(failures_before_success: usize) -> Self {
        Self {
            failures_before_success,
            calls: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
impl ItemProcessor for FlakyThenOk {
    fn name(&self) -> &'static str {
        "FlakyThenOk"
    }

    fn tab(&self) -> Tab {
        Tab::Searches
    }

    async fn process(&self, row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        let mut calls = self.calls.lock().unwrap();
        let seen = calls.entry(row.id().to_string()).or_insert(0);
        *seen += 1;
        if *seen <= self.failures_before_success {
            return Err(ProcessorError::from(FailureKind::Timeout { seconds: 1 }));
        }
        Ok(ItemYield::patch_only(FieldPatch::Search(
            SearchPatch::default(),
        )))
    }
}

#[tokio::test]
async fn permanent_failures_stop_after_one_attempt() {
    let processor = Arc::new(AlwaysFailing::new(FailureKind::HttpStatus { status: 404 }));
    let result = run(&engine(3, policy(3, 10, 100)), search_rows(4), processor).await;

    assert_eq!(result.permanently_failed, 4);
    assert_eq!(result.succeeded, 0);
    for outcome in &result.per_item {
        assert_eq!(outcome.status, ItemStatus::PermanentFailure);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error.as_deref(), Some("HTTP status 404"));
    }
}

#[tokio::test]
async fn transient_failures_exhaust_the_attempt_cap() {
    let processor = Arc::new(AlwaysFailing::new(FailureKind::Timeout { seconds: 1 }));
    let result = run(
        &engine(1, policy(3, 20, 40)),
        search_rows(1),
        processor.clone(),
    )
    .await;

    assert_eq!(result.exhausted, 1);
    let outcome = &result.per_item[0];
    assert_eq!(outcome.status, ItemStatus::TransientFailureExhausted);
    assert_eq!(outcome.attempts, 3);

    // Observed inter-attempt delays grow and stay under the ceiling.
    let times = processor.attempt_times.lock().unwrap().clone();
    assert_eq!(times.len(), 3);
    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    assert!(first_gap >= Duration::from_millis(20));
    assert!(second_gap + Duration::from_millis(5) >= first_gap, "delays shrank");
    assert!(second_gap < Duration::from_millis(200), "delay above ceiling");
}

#[tokio::test]
async fn transient_then_success_records_every_attempt() {
    let processor = Arc::new(FlakyThenOk::new(2));
    let result = run(&engine(2, policy(5, 5, 20)), search_rows(3), processor).await;

    assert_eq!(result.succeeded, 3);
    for outcome in &result.per_item {
        assert_eq!(outcome.status, ItemStatus::Success);
        assert_eq!(outcome.attempts, 3);
    }
}

/// Sleeps longer for earlier rows, so completion order reverses input
/// order unless the engine restores it.
struct ReversedLatency {
    total: usize,
}

#[async_trait]
impl ItemProcessor for ReversedLatency {
    fn name(&self) -> &'static str {
        "ReversedLatency"
    }

    fn tab(&self) -> Tab {
        Tab::Searches
    }

    async fn process(&self, row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        let index: usize = row
            .id()
            .to_string()
            .rsplit(' ')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        let delay = 10 * (self.total - index) as u64;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(ItemYield::patch_only(FieldPatch::Search(
            SearchPatch::default(),
        )))
    }
}

#[tokio::test]
async fn per_item_order_matches_input_despite_completion_order() {
    let result = run(
        &engine(6, policy(1, 5, 20)),
        search_rows(6),
        Arc::new(ReversedLatency { total: 6 }),
    )
    .await;

    assert_eq!(result.succeeded, 6);
    let ids: Vec<String> = result
        .per_item
        .iter()
        .map(|o| o.row_id.to_string())
        .collect();
    let expected: Vec<String> = (0..6).map(|i| format!("query {i}")).collect();
    assert_eq!(ids, expected);
}

/// Cancels the shared token as its second invocation starts.
struct CancelOnSecondStart {
    started: AtomicUsize,
    cancel: CancellationToken,
}

#[async_trait]
impl ItemProcessor for CancelOnSecondStart {
    fn name(&self) -> &'static str {
        "CancelOnSecondStart"
    }

    fn tab(&self) -> Tab {
        Tab::Searches
    }

    async fn process(&self, _row: &SheetRow) -> Result<ItemYield, ProcessorError> {
        if self.started.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
            self.cancel.cancel();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(ItemYield::patch_only(FieldPatch::Search(
            SearchPatch::default(),
        )))
    }
}

#[tokio::test]
async fn cancellation_skips_unstarted_items_and_finishes_in_flight_ones() {
    let cancel = CancellationToken::new();
    let processor = Arc::new(CancelOnSecondStart {
        started: AtomicUsize::new(0),
        cancel: cancel.clone(),
    });

    let result = BatchEngine::with_limits(2, Duration::from_secs(5), policy(3, 10, 100))
        .run(
            "test",
            search_rows(10),
            processor,
            Arc::new(NullProgress),
            cancel,
        )
        .await;

    assert_eq!(result.succeeded, 2, "in-flight items finish");
    assert_eq!(result.skipped, 8, "unstarted items are skipped");
    let skipped: Vec<_> = result
        .per_item
        .iter()
        .filter(|o| o.status == ItemStatus::Skipped)
        .collect();
    assert!(skipped.iter().all(|o| o.attempts == 0));
}

/// Fetcher stub for the mixed source-checking scenario: some URLs 404,
/// some time out twice then recover, the rest succeed immediately.
struct ScriptedFetcher {
    timeouts_left: Mutex<std::collections::HashMap<String, usize>>,
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FailureKind> {
        if url.contains("gone") {
            return Ok(FetchedPage {
                status: 404,
                body: String::new(),
                final_url: url.to_string(),
            });
        }
        if url.contains("flaky") {
            let mut timeouts = self.timeouts_left.lock().unwrap();
            let left = timeouts.entry(url.to_string()).or_insert(2);
            if *left > 0 {
                *left -= 1;
                return Err(FailureKind::Timeout { seconds: 1 });
            }
        }
        Ok(FetchedPage {
            status: 200,
            body: "<html><head><title>Directory</title></head><body></body></html>".to_string(),
            final_url: url.to_string(),
        })
    }
}

struct EmptyExtractor;

#[async_trait]
impl TextExtractor for EmptyExtractor {
    async fn extract_leads(&self, _page: &FetchedPage) -> Result<LeadExtraction, FailureKind> {
        Ok(LeadExtraction::default())
    }

    async fn annotate_lead(
        &self,
        _lead: &leadflow::LeadRow,
        _content: &str,
    ) -> Result<leadflow::domain::gateways::LeadAnnotation, FailureKind> {
        Ok(Default::default())
    }

    async fn personalize_email(
        &self,
        _lead: &leadflow::LeadRow,
        _template: &leadflow::domain::templates::EmailTemplate,
    ) -> Result<leadflow::domain::gateways::DraftContent, FailureKind> {
        Err(FailureKind::Other {
            detail: "not used".into(),
        })
    }
}

fn source(url: &str) -> SheetRow {
    SheetRow::Source(SourceRow {
        title: String::new(),
        url: url.to_string(),
        description: String::new(),
        date_found: "2025-11-02".to_string(),
        status: SourceStatus::New,
        leads_found: 0,
    })
}

#[tokio::test]
async fn mixed_source_batch_matches_expected_counts() {
    let mut rows = Vec::new();
    for i in 0..3 {
        rows.push(source(&format!("https://gone-{i}.example")));
    }
    for i in 0..3 {
        rows.push(source(&format!("https://flaky-{i}.example")));
    }
    for i in 0..4 {
        rows.push(source(&format!("https://steady-{i}.example")));
    }

    let checker = Arc::new(SourceChecker::new(
        Arc::new(ScriptedFetcher {
            timeouts_left: Mutex::new(std::collections::HashMap::new()),
        }),
        Arc::new(EmptyExtractor),
    ));

    let result = run(&engine(5, policy(3, 5, 20)), rows, checker).await;

    assert_eq!(result.total, 10);
    assert_eq!(result.succeeded, 7);
    assert_eq!(result.permanently_failed, 3);
    assert_eq!(result.exhausted, 0);

    // Timeouts twice then success means exactly three attempts.
    for outcome in result
        .per_item
        .iter()
        .filter(|o| o.row_id.to_string().contains("flaky"))
    {
        assert_eq!(outcome.status, ItemStatus::Success);
        assert_eq!(outcome.attempts, 3);
    }
    for outcome in result
        .per_item
        .iter()
        .filter(|o| o.row_id.to_string().contains("gone"))
    {
        assert_eq!(outcome.attempts, 1);
    }
}
