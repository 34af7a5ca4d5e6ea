//! Wire types for the statements and results REST endpoints.

use crate::streamlens::results::types::ResultPage;
use crate::streamlens::statement::{
    ResultColumn, ResultSchema, StatementMetadata, StatementPhase,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response body of the statement results endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementResultsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultsMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultsData>,
}

impl StatementResultsResponse {
    /// Collapse the wire shape into the manager's page model. An absent or
    /// empty `next` token means the server has no further pages.
    pub fn into_page(self) -> ResultPage {
        let next_token = self
            .metadata
            .and_then(|m| m.next)
            .filter(|token| !token.is_empty());
        let items = self.results.map(|r| r.data).unwrap_or_default();
        ResultPage { items, next_token }
    }
}

/// Pagination metadata attached to a results response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsMetadata {
    /// Opaque continuation token for the next page; absent or empty when no
    /// further pages exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsData {
    #[serde(default)]
    pub data: Vec<RawResultItem>,
}

/// One raw result row as returned by the service: a changelog op code plus
/// positional cell values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResultItem {
    /// 0 insert, 1 update-before, 2 update-after, 3 delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<u8>,
    #[serde(default)]
    pub row: Vec<Value>,
}

/// Response body of the statement metadata endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementResponse {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatementStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<StatementSpec>,
}

impl StatementResponse {
    /// Collapse the wire shape into the loader's metadata model, stamping the
    /// observation time. A missing status block reads as `PENDING`.
    pub fn to_metadata(&self) -> StatementMetadata {
        let phase = self
            .status
            .as_ref()
            .map(|s| StatementPhase::parse(&s.phase))
            .unwrap_or(StatementPhase::Pending);
        let detail = self.status.as_ref().and_then(|s| s.detail.clone());
        let schema = self
            .status
            .as_ref()
            .and_then(|s| s.traits.as_ref())
            .and_then(|t| t.schema.as_ref())
            .map(WireSchema::to_result_schema);
        StatementMetadata {
            phase,
            detail,
            schema,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementStatus {
    /// Wire phase string, e.g. "PENDING", "RUNNING", "COMPLETED", "FAILED",
    /// "STOPPED".
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<StatementTraits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementTraits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<WireSchema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireSchema {
    #[serde(default)]
    pub columns: Vec<WireColumn>,
}

impl WireSchema {
    pub fn to_result_schema(&self) -> ResultSchema {
        ResultSchema {
            columns: self
                .columns
                .iter()
                .map(|c| ResultColumn {
                    name: c.name.clone(),
                    data_type: c.data_type.as_ref().and_then(|t| t.kind.clone()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireColumn {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<WireDataType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireDataType {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub nullable: bool,
}

/// Mutable statement spec; only the `stopped` flag is written by this crate,
/// to request a stop via the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_pool_id: Option<String>,
    #[serde(default)]
    pub stopped: bool,
}
