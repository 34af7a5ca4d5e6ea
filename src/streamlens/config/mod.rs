//! Manager configuration.

use std::time::Duration;
use thiserror::Error;

/// Knobs for one results manager. All three are caller-supplied; the manager
/// applies no implicit defaults, which is why there is no `Default` impl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Maximum rows the buffer will hold before rejecting further appends.
    pub results_limit: usize,
    /// Period of the result-page poll loop.
    pub polling_interval: Duration,
    /// Period of the statement-status refresh loop, independent of polling.
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("results_limit must be greater than zero")]
    ZeroResultsLimit,
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
}

impl ManagerConfig {
    pub fn new(results_limit: usize, polling_interval_ms: u64, refresh_interval_ms: u64) -> Self {
        Self {
            results_limit,
            polling_interval: Duration::from_millis(polling_interval_ms),
            refresh_interval: Duration::from_millis(refresh_interval_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.results_limit == 0 {
            return Err(ConfigError::ZeroResultsLimit);
        }
        if self.polling_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "polling_interval",
            });
        }
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "refresh_interval",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        assert!(ManagerConfig::new(10_000, 800, 5_000).validate().is_ok());
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert_eq!(
            ManagerConfig::new(0, 800, 5_000).validate(),
            Err(ConfigError::ZeroResultsLimit)
        );
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        assert!(ManagerConfig::new(10, 0, 5_000).validate().is_err());
        assert!(ManagerConfig::new(10, 800, 0).validate().is_err());
    }
}
