//! Statement identity, lifecycle phases, and refreshed metadata.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one statement on the remote execution service.
///
/// Immutable once the manager is constructed; a new statement means a new
/// manager, never a mutated handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementHandle {
    pub environment_id: String,
    pub compute_pool_id: String,
    pub statement_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl StatementHandle {
    pub fn new(
        environment_id: impl Into<String>,
        compute_pool_id: impl Into<String>,
        statement_name: impl Into<String>,
    ) -> Self {
        Self {
            environment_id: environment_id.into(),
            compute_pool_id: compute_pool_id.into(),
            statement_name: statement_name.into(),
            organization_id: None,
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.environment_id, self.statement_name)
    }
}

/// Lifecycle phase of a statement.
///
/// Phases move one-directionally toward a terminal phase; once terminal, no
/// further result data will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementPhase {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl StatementPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatementPhase::Completed | StatementPhase::Failed | StatementPhase::Stopped
        )
    }

    /// Parse the wire phase string, case-insensitively.
    ///
    /// Transitional wire phases (`STOPPING`, `FAILING`, `DELETING`) map to
    /// `Running`: the statement is on its way out but not terminal yet, so the
    /// tracker keeps refreshing until the service settles. Unknown phases map
    /// to `Pending`.
    pub fn parse(wire: &str) -> Self {
        match wire.to_ascii_uppercase().as_str() {
            "PENDING" => StatementPhase::Pending,
            "RUNNING" => StatementPhase::Running,
            "COMPLETED" => StatementPhase::Completed,
            "FAILED" => StatementPhase::Failed,
            "STOPPED" => StatementPhase::Stopped,
            "STOPPING" | "FAILING" | "DELETING" => StatementPhase::Running,
            other => {
                warn!("unknown statement phase '{}', treating as PENDING", other);
                StatementPhase::Pending
            }
        }
    }
}

impl fmt::Display for StatementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementPhase::Pending => write!(f, "PENDING"),
            StatementPhase::Running => write!(f, "RUNNING"),
            StatementPhase::Completed => write!(f, "COMPLETED"),
            StatementPhase::Failed => write!(f, "FAILED"),
            StatementPhase::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// One projected column of the statement's result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// The statement's projected result columns, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSchema {
    pub columns: Vec<ResultColumn>,
}

impl ResultSchema {
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }
}

/// One observation of the statement's remote state, as returned by the
/// resource loader.
#[derive(Debug, Clone)]
pub struct StatementMetadata {
    pub phase: StatementPhase,
    pub detail: Option<String>,
    pub schema: Option<ResultSchema>,
    pub observed_at: DateTime<Utc>,
}
