//! Client seams for the two remote endpoints.
//!
//! The manager consumes these traits, never a concrete HTTP client, so tests
//! and alternative transports can supply their own implementations.

use crate::streamlens::api::error::ApiError;
use crate::streamlens::api::models::{StatementResponse, StatementResultsResponse};
use crate::streamlens::statement::StatementHandle;
use async_trait::async_trait;
use std::sync::Arc;

/// Read access to a statement's paginated results.
#[async_trait]
pub trait StatementResultsApi: Send + Sync {
    /// Fetch one page of results, resuming from `page_token` when present.
    ///
    /// Continuation is cursor-based: retrying a failed call with the same
    /// token yields the same rows, so the caller can retry without
    /// duplicating or losing data.
    async fn fetch_results_page(
        &self,
        handle: &StatementHandle,
        page_token: Option<&str>,
    ) -> Result<StatementResultsResponse, ApiError>;
}

/// Read/control access to a statement's metadata.
#[async_trait]
pub trait StatementsApi: Send + Sync {
    async fn get_statement(&self, handle: &StatementHandle)
        -> Result<StatementResponse, ApiError>;

    /// Ask the service to stop the statement. Idempotent on the service side.
    async fn stop_statement(&self, handle: &StatementHandle) -> Result<(), ApiError>;
}

/// Returns the two API clients bound to one statement's credentials.
pub trait ApiClientProvider: Send + Sync {
    fn results_api(&self, handle: &StatementHandle) -> Arc<dyn StatementResultsApi>;
    fn statements_api(&self, handle: &StatementHandle) -> Arc<dyn StatementsApi>;
}
