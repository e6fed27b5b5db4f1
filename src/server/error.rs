use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::data::DataError;

/// Unified error type for API responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing required credential or other deployment misconfiguration
    Config(String),
    /// Missing or invalid request parameter
    BadRequest(String),
    /// No quote data exists for the requested symbol
    NotFound(String),
    /// The upstream provider signalled rate limiting
    RateLimited(String),
    /// Upstream call failed at the transport or payload level
    Upstream(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration_error: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::NotFound(msg) => write!(f, "not_found: {msg}"),
            Self::RateLimited(msg) => write!(f, "rate_limited: {msg}"),
            Self::Upstream(msg) => write!(f, "upstream_error: {msg}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DataError> for ApiError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::Config(msg) => Self::Config(msg),
            DataError::RateLimit(msg) => Self::RateLimited(msg),
            DataError::Api { status_code: 429, message } => Self::RateLimited(message),
            DataError::NoData { symbol } => {
                Self::NotFound(format!("No quote data available for {symbol}"))
            }
            DataError::InvalidSymbol(_) | DataError::Validation { .. } => {
                Self::BadRequest(e.to_string())
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_maps_to_429() {
        let api: ApiError = DataError::RateLimit("call frequency exceeded".to_string()).into();
        assert!(matches!(api, ApiError::RateLimited(_)));

        let api: ApiError = DataError::Api {
            status_code: 429,
            message: "slow down".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::RateLimited(_)));
    }

    #[test]
    fn test_missing_quote_maps_to_404() {
        let api: ApiError = DataError::NoData {
            symbol: "ZZZZ".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::NotFound(_)));
    }

    #[test]
    fn test_validation_maps_to_400() {
        let api: ApiError = DataError::InvalidSymbol("bad symbol".to_string()).into();
        assert!(matches!(api, ApiError::BadRequest(_)));
    }
}
