use std::time::Duration;

use thiserror::Error;

/// Main crate error type
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Configuration rejected at construction time
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Budget did not become available before the caller's deadline.
    /// No weight is recorded for the request.
    #[error("Budget unavailable for {endpoint} (weight {weight}) within {timeout:?}")]
    BudgetTimeout {
        endpoint: String,
        weight: u32,
        timeout: Duration,
    },

    /// Config file could not be read or written
    #[error("Config IO error: {0}")]
    ConfigIo(String),

    /// Config file is not valid TOML for this crate
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// Config could not be rendered to TOML
    #[error("Config serialize error: {0}")]
    ConfigSerialize(String),

    /// Logging subscriber setup failed
    #[error("Logging error: {0}")]
    Logging(String),
}

// Convenience constructors for common error patterns
impl Error {
    /// Create a configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Create a budget timeout error
    pub fn budget_timeout(endpoint: impl Into<String>, weight: u32, timeout: Duration) -> Self {
        Error::BudgetTimeout {
            endpoint: endpoint.into(),
            weight,
            timeout,
        }
    }

    /// Whether this error means the request was never sent.
    pub fn is_budget_timeout(&self) -> bool {
        matches!(self, Error::BudgetTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_timeout_display() {
        let err = Error::budget_timeout("l2Book", 2, Duration::from_millis(500));
        assert!(err.is_budget_timeout());
        assert_eq!(
            err.to_string(),
            "Budget unavailable for l2Book (weight 2) within 500ms"
        );
    }

    #[test]
    fn test_invalid_config_is_not_timeout() {
        let err = Error::invalid_config("budget_per_window must be > 0");
        assert!(!err.is_budget_timeout());
        assert_eq!(err.to_string(), "Invalid config: budget_per_window must be > 0");
    }
}
