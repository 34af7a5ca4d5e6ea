//! Statement metadata access for the manager.
//!
//! The loader is an explicitly-injected dependency of the manager (never a
//! global singleton), so retry and caching policy for statement metadata can
//! live outside the manager and tests can script lifecycle transitions.

use crate::streamlens::api::error::ApiError;
use crate::streamlens::api::traits::StatementsApi;
use crate::streamlens::statement::{StatementHandle, StatementMetadata};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Re-fetch the statement's current lifecycle state and schema.
    async fn refresh_statement(
        &self,
        handle: &StatementHandle,
    ) -> Result<StatementMetadata, ApiError>;

    /// Request that the statement be stopped.
    async fn stop_statement(&self, handle: &StatementHandle) -> Result<(), ApiError>;
}

/// Loader backed directly by the statements API client.
pub struct RestResourceLoader {
    statements: Arc<dyn StatementsApi>,
}

impl RestResourceLoader {
    pub fn new(statements: Arc<dyn StatementsApi>) -> Self {
        Self { statements }
    }
}

#[async_trait]
impl ResourceLoader for RestResourceLoader {
    async fn refresh_statement(
        &self,
        handle: &StatementHandle,
    ) -> Result<StatementMetadata, ApiError> {
        let response = self.statements.get_statement(handle).await?;
        Ok(response.to_metadata())
    }

    async fn stop_statement(&self, handle: &StatementHandle) -> Result<(), ApiError> {
        self.statements.stop_statement(handle).await
    }
}
