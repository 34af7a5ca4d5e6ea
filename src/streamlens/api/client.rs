//! reqwest-backed client for the statements and results endpoints.

use crate::streamlens::api::error::ApiError;
use crate::streamlens::api::models::{
    StatementResponse, StatementResultsResponse, StatementSpec,
};
use crate::streamlens::api::traits::{ApiClientProvider, StatementResultsApi, StatementsApi};
use crate::streamlens::statement::StatementHandle;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// HTTP client for the statement control plane and its results endpoint.
///
/// Request timeouts belong to the underlying `reqwest::Client`; a hung call
/// bounds only its own poll tick, never the manager's synchronous reads.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Bring a pre-configured `reqwest::Client` (timeouts, proxies, TLS).
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn statement_url(&self, handle: &StatementHandle) -> String {
        format!(
            "{}/sql/v1/environments/{}/statements/{}",
            self.base_url, handle.environment_id, handle.statement_name
        )
    }

    fn results_url(&self, handle: &StatementHandle) -> String {
        format!("{}/results", self.statement_url(handle))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Check the status line, then decode the body. Undecodable bodies are
/// `Malformed` (non-retryable), not transport errors.
async fn decode<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::status(operation, status.as_u16(), message));
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::malformed(operation, e.to_string()))
}

#[async_trait]
impl StatementResultsApi for RestClient {
    async fn fetch_results_page(
        &self,
        handle: &StatementHandle,
        page_token: Option<&str>,
    ) -> Result<StatementResultsResponse, ApiError> {
        let mut request = self.authorize(self.http.get(self.results_url(handle)));
        if let Some(token) = page_token {
            request = request.query(&[("page_token", token)]);
        }
        debug!("fetching results page for {}", handle);
        let response = request.send().await?;
        decode("results", response).await
    }
}

#[async_trait]
impl StatementsApi for RestClient {
    async fn get_statement(
        &self,
        handle: &StatementHandle,
    ) -> Result<StatementResponse, ApiError> {
        let request = self.authorize(self.http.get(self.statement_url(handle)));
        let response = request.send().await?;
        decode("statement", response).await
    }

    async fn stop_statement(&self, handle: &StatementHandle) -> Result<(), ApiError> {
        // The control plane stops a statement via an update with
        // spec.stopped = true, so read-modify-write the current resource.
        let mut statement = self.get_statement(handle).await?;
        statement
            .spec
            .get_or_insert_with(StatementSpec::default)
            .stopped = true;

        let request = self
            .authorize(self.http.put(self.statement_url(handle)))
            .json(&statement);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::status("stop", status.as_u16(), message));
        }
        debug!("requested stop for {}", handle);
        Ok(())
    }
}

/// Hands out the same underlying client for both endpoints; the control plane
/// serves statements and results from one host.
#[derive(Debug, Clone)]
pub struct RestClientProvider {
    client: Arc<RestClient>,
}

impl RestClientProvider {
    pub fn new(client: RestClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl ApiClientProvider for RestClientProvider {
    fn results_api(&self, _handle: &StatementHandle) -> Arc<dyn StatementResultsApi> {
        self.client.clone()
    }

    fn statements_api(&self, _handle: &StatementHandle) -> Arc<dyn StatementsApi> {
        self.client.clone()
    }
}
