//! Cursor-keeping fetcher for the results endpoint.

use crate::streamlens::api::error::ApiError;
use crate::streamlens::api::traits::StatementResultsApi;
use crate::streamlens::results::types::ResultPage;
use crate::streamlens::statement::StatementHandle;
use std::sync::Arc;

/// Fetches consecutive result pages for one statement.
///
/// The continuation cursor advances only on success: a failed fetch leaves it
/// untouched, so the next call retries the same page and rows are neither
/// duplicated nor lost across retries.
pub struct PageFetcher {
    api: Arc<dyn StatementResultsApi>,
    handle: StatementHandle,
    page_token: Option<String>,
    fetch_count: u64,
    exhausted: bool,
}

impl PageFetcher {
    pub fn new(api: Arc<dyn StatementResultsApi>, handle: StatementHandle) -> Self {
        Self {
            api,
            handle,
            page_token: None,
            fetch_count: 0,
            exhausted: false,
        }
    }

    /// Fetch the page following the last successfully fetched one.
    pub async fn fetch_next(&mut self) -> Result<ResultPage, ApiError> {
        self.fetch_count += 1;
        let response = self
            .api
            .fetch_results_page(&self.handle, self.page_token.as_deref())
            .await?;
        let page = response.into_page();
        self.page_token = page.next_token.clone();
        self.exhausted = page.next_token.is_none();
        Ok(page)
    }

    pub fn statement(&self) -> &StatementHandle {
        &self.handle
    }

    /// Whether the server has reported that no further pages exist.
    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Attempted fetches, including failed ones.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count
    }
}
