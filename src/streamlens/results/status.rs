//! Lifecycle tracking for the owning statement.

use crate::streamlens::api::error::ApiError;
use crate::streamlens::loader::ResourceLoader;
use crate::streamlens::statement::{StatementHandle, StatementMetadata, StatementPhase};
use log::warn;
use std::sync::Arc;

/// One refresh result: the metadata observed plus whether the phase changed
/// relative to the previous observation.
#[derive(Debug)]
pub struct StatusObservation {
    pub metadata: StatementMetadata,
    pub transitioned: bool,
}

/// Periodically re-fetches the statement's lifecycle state through the
/// resource loader and detects phase transitions.
pub struct StatusTracker {
    loader: Arc<dyn ResourceLoader>,
    handle: StatementHandle,
    last_phase: Option<StatementPhase>,
}

impl StatusTracker {
    pub fn new(loader: Arc<dyn ResourceLoader>, handle: StatementHandle) -> Self {
        Self {
            loader,
            handle,
            last_phase: None,
        }
    }

    /// Re-fetch the statement's state.
    ///
    /// Phases move one-directionally toward a terminal phase: a wire
    /// regression out of a terminal phase is ignored and logged, and the
    /// previously observed terminal phase is kept.
    pub async fn refresh(&mut self) -> Result<StatusObservation, ApiError> {
        let mut metadata = self.loader.refresh_statement(&self.handle).await?;

        if let Some(prev) = self.last_phase {
            if prev.is_terminal() && !metadata.phase.is_terminal() {
                warn!(
                    "statement {} reported {} after terminal {}; keeping {}",
                    self.handle, metadata.phase, prev, prev
                );
                metadata.phase = prev;
                return Ok(StatusObservation {
                    metadata,
                    transitioned: false,
                });
            }
        }

        let transitioned = self.last_phase != Some(metadata.phase);
        self.last_phase = Some(metadata.phase);
        Ok(StatusObservation {
            metadata,
            transitioned,
        })
    }

    pub fn statement(&self) -> &StatementHandle {
        &self.handle
    }

    pub fn last_phase(&self) -> Option<StatementPhase> {
        self.last_phase
    }
}
