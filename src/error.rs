use std::fmt;

use thiserror::Error;

/// Invalid or missing run configuration. Raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} must be a valid {expected} (got {value:?})")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0}")]
    Constraint(String),
}

/// A single ticker that could not be fetched. Recorded in the run result,
/// never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerFetchError {
    pub ticker: String,
    pub reason: String,
}

impl TickerFetchError {
    pub fn new(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TickerFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.ticker, self.reason)
    }
}

/// The quote provider is wholly unreachable; the run cannot produce anything.
#[derive(Debug, Error)]
#[error("market data source unavailable: {0}")]
pub struct DataSourceUnavailable(pub String);

/// Webhook delivery failure, either non-retryable or after retries ran out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("invalid webhook endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{0}")]
    Transient(String),

    #[error("webhook rejected message: HTTP {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("webhook delivery gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Fatal run errors, each mapped to a distinct process exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    DataSource(#[from] DataSourceUnavailable),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Config(_) => 2,
            RunError::DataSource(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let config = RunError::from(ConfigError::Missing("DISCORD_WEBHOOK_URL"));
        let source = RunError::from(DataSourceUnavailable("all tickers failed".into()));

        assert_eq!(config.exit_code(), 2);
        assert_eq!(source.exit_code(), 3);
    }

    #[test]
    fn test_diagnostics_are_single_line() {
        let err = RunError::from(ConfigError::Invalid {
            name: "MIN_PRICE",
            expected: "number",
            value: "abc".into(),
        });
        let text = err.to_string();

        assert!(!text.contains('\n'));
        assert!(text.contains("MIN_PRICE"));
    }
}
