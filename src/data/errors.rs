use thiserror::Error;

/// Error types for market-data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("API error: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream rate limit: {0}")]
    RateLimit(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("No data available for {symbol}")]
    NoData { symbol: String },

    #[error("Data validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for data operations
pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    /// True when the upstream itself signalled a request-rate ceiling.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            DataError::RateLimit(_) => true,
            DataError::Api { status_code, .. } => *status_code == 429,
            _ => false,
        }
    }

    /// Create a parse error with context
    pub fn parse_error<S: Into<String>>(message: S) -> Self {
        DataError::Parse {
            message: message.into(),
        }
    }

    /// Create a validation error with field context
    pub fn validation_error<S: Into<String>>(field: S, message: S) -> Self {
        DataError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an API error with status code
    pub fn api_error<S: Into<String>>(status_code: u16, message: S) -> Self {
        DataError::Api {
            status_code,
            message: message.into(),
        }
    }
}
