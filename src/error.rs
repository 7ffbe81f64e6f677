//! Error types for rusty-forex

use chrono::NaiveDate;
use thiserror::Error;

/// Failure of a single upstream fetch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Transport failure: {message}")]
    TransportFailure { message: String, timed_out: bool },

    #[error("Upstream rejected request with status {status}: {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("No data available for {symbol} between {start} and {end}")]
    NoDataAvailable {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl FetchError {
    /// Whether a caller-level retry could plausibly succeed.
    ///
    /// `NoDataAvailable` means the upstream answered and had nothing for the
    /// window, so retrying immediately is pointless.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::NoDataAvailable { .. })
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, FetchError::NoDataAvailable { .. })
    }
}

/// Main error type for rusty-forex
#[derive(Error, Debug)]
pub enum ForexError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for ForexError {
    fn from(err: rusqlite::Error) -> Self {
        ForexError::Storage(err.to_string())
    }
}

/// Result type alias for rusty-forex operations
pub type Result<T> = std::result::Result<T, ForexError>;
