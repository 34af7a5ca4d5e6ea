//! Request/response protocol between the manager and the host view layer.
//!
//! This is the sole contract the host depends on. The tag names are part of
//! the wire contract and must stay backward compatible; the view layer and
//! the manager evolve independently.

use crate::streamlens::results::types::NormalizedRow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Requests the host layer may send.
///
/// Pagination fields are signed on purpose: a host sending a negative value
/// must get a typed validation error back, not a silently coerced slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum ResultsRequest {
    GetResults { page: i64, page_size: i64 },
    GetResultsCount,
    StopStatement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum ResultsResponse {
    Results { results: Vec<NormalizedRow> },
    ResultsCount { total: usize },
    StopRequested,
}

/// The only error that crosses the message boundary: caller misuse.
/// Fetch and parse failures never surface here; they become manager state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid pagination request: page {page}, page_size {page_size}")]
    InvalidPagination { page: i64, page_size: i64 },
}

/// Pagination arguments after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn validate(page: i64, page_size: i64) -> Result<Self, ProtocolError> {
        if page < 0 || page_size <= 0 {
            return Err(ProtocolError::InvalidPagination { page, page_size });
        }
        Ok(Self {
            page: page as usize,
            page_size: page_size as usize,
        })
    }
}
