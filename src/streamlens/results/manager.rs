//! Orchestrates result polling, status refresh, and the host-facing message
//! protocol for one statement.
//!
//! Two independently scheduled loops share one state block: the poll loop is
//! the sole writer of the buffer, the refresh loop the sole writer of phase
//! and schema. Every lock is held only for a non-awaiting critical section,
//! so `handle_message` is a plain synchronous read that can never stall the
//! host's render path.

use crate::streamlens::api::traits::{ApiClientProvider, StatementResultsApi};
use crate::streamlens::config::{ConfigError, ManagerConfig};
use crate::streamlens::loader::{ResourceLoader, RestResourceLoader};
use crate::streamlens::results::buffer::ResultsBuffer;
use crate::streamlens::results::fetcher::PageFetcher;
use crate::streamlens::results::notify::ChangeSink;
use crate::streamlens::results::parser::parse_page;
use crate::streamlens::results::protocol::{
    PageRequest, ProtocolError, ResultsRequest, ResultsResponse,
};
use crate::streamlens::results::status::StatusTracker;
use crate::streamlens::statement::{ResultSchema, StatementHandle, StatementPhase};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// State shared between the two loops and the synchronous message handler.
struct SharedState {
    buffer: RwLock<ResultsBuffer>,
    phase: RwLock<StatementPhase>,
    schema: RwLock<Option<Arc<ResultSchema>>>,
    last_fetch_error: RwLock<Option<String>>,
    fetch_halted: AtomicBool,
    sink: Box<dyn ChangeSink>,
}

impl SharedState {
    fn phase(&self) -> StatementPhase {
        *read_lock(&self.phase)
    }

    fn schema(&self) -> Option<Arc<ResultSchema>> {
        read_lock(&self.schema).clone()
    }

    fn notify(&self) {
        self.sink.notify();
    }
}

// The shared data is plain state; a panicked writer leaves nothing
// half-updated worth dying for, so poisoned locks are recovered.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Which loops finished within the shutdown timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOutcome {
    pub poll_completed: bool,
    pub refresh_completed: bool,
}

/// Incrementally fetches one statement's results into a bounded buffer and
/// serves paginated reads from it.
///
/// Scoped to a single statement: consuming a different statement means
/// shutting this manager down and starting a new one.
pub struct StatementResultsManager {
    handle: StatementHandle,
    config: ManagerConfig,
    loader: Arc<dyn ResourceLoader>,
    shared: Arc<SharedState>,
    poll_handle: JoinHandle<()>,
    refresh_handle: JoinHandle<()>,
    shutdown_tx: broadcast::Sender<()>,
}

impl StatementResultsManager {
    /// Validate the configuration, observe the statement once (phase and
    /// schema), then start the poll and refresh loops.
    ///
    /// The initial observation is best-effort: if it fails, the manager
    /// starts from `PENDING` and the refresh loop fills in the rest.
    pub async fn start(
        handle: StatementHandle,
        config: ManagerConfig,
        results_api: Arc<dyn StatementResultsApi>,
        loader: Arc<dyn ResourceLoader>,
        sink: Box<dyn ChangeSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut tracker = StatusTracker::new(Arc::clone(&loader), handle.clone());
        let (initial_phase, initial_schema) = match tracker.refresh().await {
            Ok(observation) => (
                observation.metadata.phase,
                observation.metadata.schema.map(Arc::new),
            ),
            Err(e) => {
                warn!("initial status fetch for {} failed: {}", handle, e);
                (StatementPhase::Pending, None)
            }
        };

        let shared = Arc::new(SharedState {
            buffer: RwLock::new(ResultsBuffer::new(config.results_limit)),
            phase: RwLock::new(initial_phase),
            schema: RwLock::new(initial_schema),
            last_fetch_error: RwLock::new(None),
            fetch_halted: AtomicBool::new(false),
            sink,
        });

        let (shutdown_tx, _) = broadcast::channel(4);

        let fetcher = PageFetcher::new(results_api, handle.clone());
        let poll_handle = tokio::spawn(poll_loop(
            fetcher,
            Arc::clone(&shared),
            config.polling_interval,
            shutdown_tx.subscribe(),
        ));
        let refresh_handle = tokio::spawn(refresh_loop(
            tracker,
            Arc::clone(&shared),
            config.refresh_interval,
            shutdown_tx.clone(),
            shutdown_tx.subscribe(),
        ));

        info!(
            "results manager started for {} ({}, limit {} rows, poll {:?}, refresh {:?})",
            handle, initial_phase, config.results_limit, config.polling_interval,
            config.refresh_interval
        );

        Ok(Self {
            handle,
            config,
            loader,
            shared,
            poll_handle,
            refresh_handle,
            shutdown_tx,
        })
    }

    /// Like [`start`](Self::start), wiring both clients from a provider.
    pub async fn start_with_provider(
        handle: StatementHandle,
        config: ManagerConfig,
        provider: &dyn ApiClientProvider,
        sink: Box<dyn ChangeSink>,
    ) -> Result<Self, ConfigError> {
        let results_api = provider.results_api(&handle);
        let loader = Arc::new(RestResourceLoader::new(provider.statements_api(&handle)));
        Self::start(handle, config, results_api, loader, sink).await
    }

    /// Synchronous request handler, resolved against the current in-memory
    /// snapshot. Never blocks on network I/O; well-formed pagination requests
    /// never fail, even against an empty buffer.
    pub fn handle_message(
        &self,
        request: ResultsRequest,
    ) -> Result<ResultsResponse, ProtocolError> {
        match request {
            ResultsRequest::GetResults { page, page_size } => {
                let range = PageRequest::validate(page, page_size)?;
                let results = read_lock(&self.shared.buffer).slice(range.page, range.page_size);
                Ok(ResultsResponse::Results { results })
            }
            ResultsRequest::GetResultsCount => Ok(ResultsResponse::ResultsCount {
                total: read_lock(&self.shared.buffer).count(),
            }),
            ResultsRequest::StopStatement => {
                // Routed to the resource loader off the handler's thread; the
                // refresh loop picks up the resulting phase change.
                let loader = Arc::clone(&self.loader);
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = loader.stop_statement(&handle).await {
                        error!("stop request for {} failed: {}", handle, e);
                    }
                });
                Ok(ResultsResponse::StopRequested)
            }
        }
    }

    pub fn statement(&self) -> &StatementHandle {
        &self.handle
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn phase(&self) -> StatementPhase {
        self.shared.phase()
    }

    pub fn schema(&self) -> Option<Arc<ResultSchema>> {
        self.shared.schema()
    }

    pub fn results_count(&self) -> usize {
        read_lock(&self.shared.buffer).count()
    }

    /// Whether the poll loop has stopped fetching ahead of a terminal phase
    /// (buffer full or non-retryable fetch failure). Buffered rows stay
    /// queryable either way.
    pub fn fetch_halted(&self) -> bool {
        self.shared.fetch_halted.load(Ordering::SeqCst)
    }

    pub fn last_fetch_error(&self) -> Option<String> {
        read_lock(&self.shared.last_fetch_error).clone()
    }

    /// Stop both loops and wait for them to finish. After this returns, no
    /// further fetch or refresh calls occur.
    pub async fn shutdown(self, timeout: Duration) -> ShutdownOutcome {
        info!("shutting down results manager for {}", self.handle);
        let _ = self.shutdown_tx.send(());
        ShutdownOutcome {
            poll_completed: join_loop("poll", self.poll_handle, timeout).await,
            refresh_completed: join_loop("refresh", self.refresh_handle, timeout).await,
        }
    }
}

async fn join_loop(name: &str, handle: JoinHandle<()>, timeout: Duration) -> bool {
    let abort = handle.abort_handle();
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("results manager {} loop panicked: {:?}", name, e);
            false
        }
        Err(_) => {
            warn!(
                "results manager {} loop did not stop within {:?}; aborting",
                name, timeout
            );
            abort.abort();
            false
        }
    }
}

/// Repeatedly fetch the next result page, parse it, and append to the buffer.
///
/// A fetch already in flight when the shutdown signal arrives completes, and
/// its rows are appended, before the loop observes the signal; the last valid
/// batch is never discarded.
async fn poll_loop(
    mut fetcher: PageFetcher,
    shared: Arc<SharedState>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        "results poll loop started for {} (period {:?})",
        fetcher.statement(),
        period
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("results poll loop for {} received shutdown", fetcher.statement());
                break;
            }
            _ = interval.tick() => {
                let phase = shared.phase();
                if phase.is_terminal() {
                    debug!(
                        "statement {} is {}; results poll loop halting",
                        fetcher.statement(), phase
                    );
                    break;
                }

                match fetcher.fetch_next().await {
                    Ok(page) => {
                        let exhausted = !page.has_more();
                        if page.is_data_bearing() {
                            let schema = shared.schema();
                            let rows = parse_page(&page.items, schema.as_deref());
                            let outcome = write_lock(&shared.buffer).append(rows);
                            if outcome.appended > 0 {
                                shared.notify();
                            }
                            if outcome.at_capacity {
                                if outcome.dropped > 0 {
                                    warn!(
                                        "results buffer for {} is full; dropped {} rows, halting fetch",
                                        fetcher.statement(), outcome.dropped
                                    );
                                } else {
                                    info!(
                                        "results buffer for {} reached its {} row limit; halting fetch",
                                        fetcher.statement(),
                                        read_lock(&shared.buffer).capacity()
                                    );
                                }
                                shared.fetch_halted.store(true, Ordering::SeqCst);
                                shared.notify();
                                break;
                            }
                        }
                        if exhausted {
                            debug!(
                                "results endpoint reported no further pages for {}",
                                fetcher.statement()
                            );
                            break;
                        }
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(
                            "transient results fetch failure for {} (will retry): {}",
                            fetcher.statement(), e
                        );
                    }
                    Err(e) => {
                        error!(
                            "results fetch for {} failed permanently: {}",
                            fetcher.statement(), e
                        );
                        *write_lock(&shared.last_fetch_error) = Some(e.to_string());
                        shared.fetch_halted.store(true, Ordering::SeqCst);
                        shared.notify();
                        break;
                    }
                }
            }
        }
    }

    debug!(
        "results poll loop for {} terminated after {} fetches",
        fetcher.statement(),
        fetcher.fetch_count()
    );
}

/// Keep the statement's lifecycle state fresh; on a terminal transition, stop
/// the poll loop and freeze the buffer as the final snapshot.
async fn refresh_loop(
    mut tracker: StatusTracker,
    shared: Arc<SharedState>,
    period: Duration,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        "status refresh loop started for {} (period {:?})",
        tracker.statement(),
        period
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("status refresh loop for {} received shutdown", tracker.statement());
                break;
            }
            _ = interval.tick() => {
                match tracker.refresh().await {
                    Ok(observation) => {
                        if let Some(schema) = observation.metadata.schema {
                            let mut slot = write_lock(&shared.schema);
                            if slot.is_none() {
                                *slot = Some(Arc::new(schema));
                            }
                        }
                        if observation.transitioned {
                            info!(
                                "statement {} is now {}",
                                tracker.statement(), observation.metadata.phase
                            );
                            *write_lock(&shared.phase) = observation.metadata.phase;
                            shared.notify();
                        }
                        if observation.metadata.phase.is_terminal() {
                            // stops the poll loop; an in-flight fetch still lands
                            let _ = shutdown_tx.send(());
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            "status refresh for {} failed (will retry): {}",
                            tracker.statement(), e
                        );
                    }
                }
            }
        }
    }

    debug!("status refresh loop for {} terminated", tracker.statement());
}
