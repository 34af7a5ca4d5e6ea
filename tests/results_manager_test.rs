//! End-to-end tests for the statement results manager, driven by scripted
//! fixture pages and a scripted resource loader.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use streamlens::streamlens::api::models::{
    RawResultItem, ResultsData, ResultsMetadata, StatementResultsResponse,
};
use streamlens::streamlens::statement::{ResultColumn, ResultSchema, StatementMetadata};
use streamlens::{
    ApiError, ChangeOp, ChangeSink, ManagerConfig, NoopSink, NormalizedRow, ProtocolError,
    ResourceLoader, RestClient, RestClientProvider, ResultsRequest, ResultsResponse, RowValue,
    StatementHandle, StatementPhase, StatementResultsApi, StatementResultsManager,
};

/// Serves a fixed sequence of result pages keyed by continuation token, so a
/// retried fetch re-serves the same page. Optionally fails once (transient)
/// or permanently (fatal) at a given page index.
struct FixtureResultsApi {
    pages: Vec<Vec<RawResultItem>>,
    endless: bool,
    fail_once_at: Mutex<Option<usize>>,
    fatal_at: Option<usize>,
    calls: AtomicU64,
}

impl FixtureResultsApi {
    fn new(pages: Vec<Vec<RawResultItem>>) -> Self {
        Self {
            pages,
            endless: false,
            fail_once_at: Mutex::new(None),
            fatal_at: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Never reports exhaustion; pages cycle forever.
    fn endless(pages: Vec<Vec<RawResultItem>>) -> Self {
        Self {
            endless: true,
            ..Self::new(pages)
        }
    }

    fn with_transient_failure_at(self, index: usize) -> Self {
        *self.fail_once_at.lock().unwrap() = Some(index);
        self
    }

    fn with_fatal_failure_at(mut self, index: usize) -> Self {
        self.fatal_at = Some(index);
        self
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn response_for(&self, index: usize) -> StatementResultsResponse {
        let data = if self.endless && !self.pages.is_empty() {
            self.pages[index % self.pages.len()].clone()
        } else {
            self.pages.get(index).cloned().unwrap_or_default()
        };
        let next = if self.endless || index + 1 < self.pages.len() {
            Some(format!("p{}", index + 1))
        } else {
            None
        };
        StatementResultsResponse {
            metadata: Some(ResultsMetadata { next }),
            results: Some(ResultsData { data }),
        }
    }
}

#[async_trait]
impl StatementResultsApi for FixtureResultsApi {
    async fn fetch_results_page(
        &self,
        _handle: &StatementHandle,
        page_token: Option<&str>,
    ) -> Result<StatementResultsResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = page_token
            .and_then(|t| t.strip_prefix('p'))
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);

        {
            let mut fail_once = self.fail_once_at.lock().unwrap();
            if *fail_once == Some(index) {
                *fail_once = None;
                return Err(ApiError::status("results", 503, "service unavailable"));
            }
        }
        if self.fatal_at == Some(index) {
            return Err(ApiError::status("results", 403, "forbidden"));
        }
        Ok(self.response_for(index))
    }
}

/// Replays a queue of lifecycle phases, repeating the last one forever.
struct ScriptedLoader {
    phases: Mutex<VecDeque<StatementPhase>>,
    schema: Option<ResultSchema>,
    stops: AtomicU64,
}

impl ScriptedLoader {
    fn with_phases(phases: Vec<StatementPhase>, schema: Option<ResultSchema>) -> Self {
        Self {
            phases: Mutex::new(phases.into_iter().collect()),
            schema,
            stops: AtomicU64::new(0),
        }
    }

    fn running(schema: Option<ResultSchema>) -> Self {
        Self::with_phases(vec![StatementPhase::Running], schema)
    }

    fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceLoader for ScriptedLoader {
    async fn refresh_statement(
        &self,
        _handle: &StatementHandle,
    ) -> Result<StatementMetadata, ApiError> {
        let phase = {
            let mut queue = self.phases.lock().unwrap();
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                *queue.front().unwrap_or(&StatementPhase::Running)
            }
        };
        Ok(StatementMetadata {
            phase,
            detail: None,
            schema: self.schema.clone(),
            observed_at: Utc::now(),
        })
    }

    async fn stop_statement(&self, _handle: &StatementHandle) -> Result<(), ApiError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CountingSink(Arc<AtomicU64>);

impl ChangeSink for CountingSink {
    fn notify(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn fixture_schema() -> ResultSchema {
    ResultSchema {
        columns: vec![
            ResultColumn {
                name: "label".to_string(),
                data_type: Some("VARCHAR".to_string()),
            },
            ResultColumn {
                name: "value".to_string(),
                data_type: Some("BIGINT".to_string()),
            },
        ],
    }
}

/// `pages` pages of `rows_per_page` rows each; row N carries ["row-N", N].
fn fixture_pages(pages: usize, rows_per_page: usize) -> Vec<Vec<RawResultItem>> {
    (0..pages)
        .map(|p| {
            (0..rows_per_page)
                .map(|r| {
                    let n = p * rows_per_page + r;
                    RawResultItem {
                        op: Some(0),
                        row: vec![json!(format!("row-{}", n)), json!(n)],
                    }
                })
                .collect()
        })
        .collect()
}

fn expected_rows(count: usize) -> Vec<NormalizedRow> {
    (0..count)
        .map(|n| NormalizedRow {
            seq: n as u64,
            op: ChangeOp::Insert,
            columns: vec![
                (
                    "label".to_string(),
                    RowValue::Text(format!("row-{}", n)),
                ),
                ("value".to_string(), RowValue::Integer(n as i64)),
            ],
        })
        .collect()
}

fn test_handle() -> StatementHandle {
    StatementHandle::new("env-1", "pool-1", "word-count")
}

async fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    predicate()
}

fn count_of(manager: &StatementResultsManager) -> usize {
    match manager.handle_message(ResultsRequest::GetResultsCount) {
        Ok(ResultsResponse::ResultsCount { total }) => total,
        other => panic!("unexpected count response: {:?}", other),
    }
}

fn page_of(manager: &StatementResultsManager, page: i64, page_size: i64) -> Vec<NormalizedRow> {
    match manager.handle_message(ResultsRequest::GetResults { page, page_size }) {
        Ok(ResultsResponse::Results { results }) => results,
        other => panic!("unexpected results response: {:?}", other),
    }
}

#[tokio::test]
async fn test_fixture_pages_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();

    let api = Arc::new(FixtureResultsApi::new(fixture_pages(5, 2)));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 1, 1),
        api.clone(),
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || count_of(&manager) == 10).await);

    assert_eq!(page_of(&manager, 0, 10), expected_rows(10));
    // an interior page is the matching sub-slice
    assert_eq!(page_of(&manager, 1, 4), expected_rows(10)[4..8].to_vec());
    // the last partial page clips
    assert_eq!(page_of(&manager, 3, 3), expected_rows(10)[9..].to_vec());

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_count_is_monotonic_while_running() {
    let api = Arc::new(FixtureResultsApi::new(fixture_pages(5, 2)));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 1, 1),
        api,
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    let mut samples = Vec::new();
    let start = tokio::time::Instant::now();
    while count_of(&manager) < 10 && start.elapsed() < Duration::from_secs(2) {
        samples.push(count_of(&manager));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    samples.push(count_of(&manager));

    assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(*samples.last().unwrap(), 10);

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_out_of_range_page_is_empty_not_an_error() {
    let api = Arc::new(FixtureResultsApi::new(fixture_pages(2, 2)));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 1, 1),
        api,
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    // empty buffer reads are fine before anything arrives
    assert!(page_of(&manager, 0, 10).len() <= 4);

    assert!(wait_until(Duration::from_secs(2), || count_of(&manager) == 4).await);
    assert!(page_of(&manager, 50, 10).is_empty());

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_transient_failure_retries_without_duplication_or_loss() {
    let api = Arc::new(FixtureResultsApi::new(fixture_pages(5, 2)).with_transient_failure_at(2));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 1, 1),
        api.clone(),
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || count_of(&manager) == 10).await);

    // the same final row set as an error-free run: no duplicates, no gaps
    assert_eq!(page_of(&manager, 0, 100), expected_rows(10));
    // the failed attempt plus the retry both hit the API
    assert!(api.calls() >= 6);
    assert!(!manager.fetch_halted());

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_capacity_halts_fetching_and_keeps_buffered_rows() {
    let api = Arc::new(FixtureResultsApi::new(fixture_pages(5, 2)));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(3, 1, 1),
        api.clone(),
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || manager.fetch_halted()).await);

    assert_eq!(count_of(&manager), 3);
    assert_eq!(page_of(&manager, 0, 10), expected_rows(3));

    // no further growth once halted
    let calls = api.calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count_of(&manager), 3);
    assert_eq!(api.calls(), calls);

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_terminal_phase_halts_fetching() {
    let api = Arc::new(FixtureResultsApi::endless(fixture_pages(1, 1)));
    let loader = Arc::new(ScriptedLoader::with_phases(
        vec![StatementPhase::Running, StatementPhase::Completed],
        Some(fixture_schema()),
    ));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(1000, 5, 2),
        api.clone(),
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    assert!(
        wait_until(Duration::from_secs(2), || {
            manager.phase() == StatementPhase::Completed
        })
        .await
    );

    // let any in-flight fetch land, then the call count must stay frozen
    tokio::time::sleep(Duration::from_millis(25)).await;
    let calls = api.calls();
    let count = count_of(&manager);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(api.calls(), calls);
    assert_eq!(count_of(&manager), count);

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_validation_rejects_bad_pagination() {
    let api = Arc::new(FixtureResultsApi::new(fixture_pages(1, 1)));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 1, 1),
        api,
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    let err = manager
        .handle_message(ResultsRequest::GetResults {
            page: -1,
            page_size: 10,
        })
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::InvalidPagination {
            page: -1,
            page_size: 10
        }
    );

    assert!(manager
        .handle_message(ResultsRequest::GetResults {
            page: 0,
            page_size: 0,
        })
        .is_err());

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_fatal_fetch_error_keeps_partial_results_and_refresh_alive() {
    let api = Arc::new(FixtureResultsApi::new(fixture_pages(5, 2)).with_fatal_failure_at(1));
    let loader = Arc::new(ScriptedLoader::with_phases(
        vec![
            StatementPhase::Running,
            StatementPhase::Running,
            StatementPhase::Running,
            StatementPhase::Completed,
        ],
        Some(fixture_schema()),
    ));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 1, 5),
        api,
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || manager.fetch_halted()).await);

    // page 0 landed before the failure and stays visible
    assert_eq!(count_of(&manager), 2);
    assert_eq!(page_of(&manager, 0, 10), expected_rows(2));
    let error = manager.last_fetch_error().unwrap();
    assert!(error.contains("403"), "unexpected error: {}", error);

    // status tracking outlives the halted poll loop
    assert!(
        wait_until(Duration::from_secs(2), || {
            manager.phase() == StatementPhase::Completed
        })
        .await
    );
    assert_eq!(count_of(&manager), 2);

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_stop_request_routes_to_loader() {
    let api = Arc::new(FixtureResultsApi::endless(fixture_pages(1, 1)));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 5, 5),
        api,
        loader.clone(),
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    let response = manager
        .handle_message(ResultsRequest::StopStatement)
        .unwrap();
    assert_eq!(response, ResultsResponse::StopRequested);

    assert!(wait_until(Duration::from_secs(2), || loader.stops() >= 1).await);

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_sink_notified_on_appends_and_terminal_transition() {
    let api = Arc::new(FixtureResultsApi::new(fixture_pages(2, 2)));
    // enough RUNNING observations for both pages to land before the terminal
    // transition arrives
    let loader = Arc::new(ScriptedLoader::with_phases(
        vec![
            StatementPhase::Running,
            StatementPhase::Running,
            StatementPhase::Running,
            StatementPhase::Running,
            StatementPhase::Running,
            StatementPhase::Completed,
        ],
        Some(fixture_schema()),
    ));
    let sink = CountingSink::default();
    let notifications = sink.0.clone();

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100, 1, 2),
        api,
        loader,
        Box::new(sink),
    )
    .await
    .unwrap();

    assert!(
        wait_until(Duration::from_secs(2), || {
            count_of(&manager) == 4 && manager.phase() == StatementPhase::Completed
        })
        .await
    );

    // two page appends plus the terminal transition
    assert!(notifications.load(Ordering::SeqCst) >= 3);

    manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_unreachable_service_degrades_gracefully() {
    // nothing listens on the discard port; every call is connection-refused
    let provider = RestClientProvider::new(RestClient::new("http://127.0.0.1:9"));

    let manager = StatementResultsManager::start_with_provider(
        test_handle(),
        ManagerConfig::new(100, 10, 10),
        &provider,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.phase(), StatementPhase::Pending);
    assert_eq!(count_of(&manager), 0);
    // connection failures are transient, so fetching keeps retrying
    assert!(!manager.fetch_halted());

    let outcome = manager.shutdown(Duration::from_secs(2)).await;
    assert!(outcome.poll_completed);
    assert!(outcome.refresh_completed);
}

#[tokio::test]
async fn test_shutdown_is_deterministic() {
    let api = Arc::new(FixtureResultsApi::endless(fixture_pages(1, 1)));
    let loader = Arc::new(ScriptedLoader::running(Some(fixture_schema())));

    let manager = StatementResultsManager::start(
        test_handle(),
        ManagerConfig::new(100_000, 1, 1),
        api.clone(),
        loader,
        Box::new(NoopSink),
    )
    .await
    .unwrap();

    assert!(wait_until(Duration::from_secs(2), || api.calls() > 0).await);

    let outcome = manager.shutdown(Duration::from_secs(2)).await;
    assert!(outcome.poll_completed);
    assert!(outcome.refresh_completed);

    // no fetches after shutdown returns
    let calls = api.calls();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(api.calls(), calls);
}
