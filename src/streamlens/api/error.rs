//! Error type for the remote API clients, with retryable classification.
//!
//! The manager's poll loop keys off `is_retryable()`: transient failures are
//! absorbed and retried on the next scheduled tick, everything else halts
//! fetching while leaving buffered rows queryable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure: connect, DNS, TLS, timeout, interrupted body.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status} for {operation}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("malformed {operation} response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn status(operation: &'static str, status: u16, message: impl Into<String>) -> Self {
        ApiError::Status {
            operation,
            status,
            message: message.into(),
        }
    }

    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        ApiError::Malformed {
            operation,
            message: message.into(),
        }
    }

    /// Whether the next scheduled attempt may succeed. Server-side and
    /// transport trouble is retryable; client-side rejection and undecodable
    /// bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            ApiError::Malformed { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(ApiError::status("results", 500, "oops").is_retryable());
        assert!(ApiError::status("results", 503, "unavailable").is_retryable());
        assert!(ApiError::status("results", 429, "slow down").is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!ApiError::status("results", 401, "unauthorized").is_retryable());
        assert!(!ApiError::status("results", 403, "forbidden").is_retryable());
        assert!(!ApiError::status("results", 404, "gone").is_retryable());
    }

    #[test]
    fn test_malformed_is_not_retryable() {
        assert!(!ApiError::malformed("results", "missing field").is_retryable());
    }
}
