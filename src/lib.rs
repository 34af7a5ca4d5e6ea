//! # streamlens
//!
//! Incremental, bounded-buffer consumption of remote streaming-SQL statement
//! results. A [`StatementResultsManager`] polls a statement's paginated
//! results endpoint, normalizes and buffers the rows under a configured
//! limit, tracks the statement's lifecycle on an independent timer, and
//! serves synchronous paginated reads to a host UI layer through a small
//! message protocol.
//!
//! ## Features
//!
//! - **Cursor-based pagination**: fetch retries never duplicate or lose rows
//! - **Bounded buffering**: a full buffer halts fetching, never evicts rows
//! - **Dual independent timers**: result polling and status refresh run on
//!   their own periods and shut down deterministically
//! - **Synchronous reads**: `handle_message` answers from the in-memory
//!   snapshot and never touches the network
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use streamlens::{
//!     ManagerConfig, NoopSink, RestClient, RestResourceLoader, ResultsRequest,
//!     StatementHandle, StatementResultsManager,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(
//!         RestClient::new("https://flink.example.com").with_bearer_token("api-token"),
//!     );
//!     let loader = Arc::new(RestResourceLoader::new(client.clone()));
//!     let handle = StatementHandle::new("env-123", "pool-456", "orders-per-minute");
//!
//!     let manager = StatementResultsManager::start(
//!         handle,
//!         ManagerConfig::new(10_000, 800, 5_000),
//!         client,
//!         loader,
//!         Box::new(NoopSink),
//!     )
//!     .await?;
//!
//!     let count = manager.handle_message(ResultsRequest::GetResultsCount)?;
//!     println!("buffered so far: {:?}", count);
//!
//!     let page = manager.handle_message(ResultsRequest::GetResults {
//!         page: 0,
//!         page_size: 100,
//!     })?;
//!     println!("first page: {:?}", page);
//!
//!     manager.shutdown(Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! ```

pub mod streamlens;

// Re-export the main API at the crate root for easy access
pub use streamlens::{
    api::client::{RestClient, RestClientProvider},
    api::error::ApiError,
    api::traits::{ApiClientProvider, StatementResultsApi, StatementsApi},
    config::{ConfigError, ManagerConfig},
    loader::{ResourceLoader, RestResourceLoader},
    results::manager::{ShutdownOutcome, StatementResultsManager},
    results::notify::{ChangeSink, NoopSink},
    results::protocol::{ProtocolError, ResultsRequest, ResultsResponse},
    results::types::{ChangeOp, NormalizedRow, RowValue},
    statement::{StatementHandle, StatementMetadata, StatementPhase},
};
