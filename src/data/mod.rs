//! Market-data layer: upstream client, session classification, snapshot
//! aggregation, and derived display metrics.

pub mod client;
pub mod derived;
pub mod errors;
pub mod session;
pub mod snapshot;

// Re-export commonly used types
pub use client::MarketDataClient;
pub use errors::{DataError, DataResult};
pub use session::{classify, DataSource, SessionState};
pub use snapshot::{MarketSnapshot, SnapshotBuilder, SnapshotDepth};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized quote for one symbol. All numeric fields are finite; the
/// upstream change-percent arrives with a trailing "%" and is stripped
/// during parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
    pub change: f64,
    pub change_percent: f64,
    pub as_of: DateTime<Utc>,
}

/// A ticker from a top-gainers/top-losers/most-active upstream response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mover {
    pub ticker: String,
    pub price: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub volume: i64,
    /// Detail quote fetched at comprehensive depth only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
}

/// News article with its per-article sentiment score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub sentiment: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Aggregated news sentiment, bucketed into a 7-level label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub score: f64,
    pub label: String,
    pub article_count: usize,
    pub window_label: String,
}

/// Macro indicator readings, one value per series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicIndicators {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fed_funds_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treasury_10y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unemployment: Option<f64>,
}

impl EconomicIndicators {
    pub fn is_empty(&self) -> bool {
        self.fed_funds_rate.is_none()
            && self.treasury_10y.is_none()
            && self.cpi.is_none()
            && self.unemployment.is_none()
    }
}

/// Validation helpers
pub mod validation {
    use super::*;

    /// Validate a stock symbol (basic US market symbols)
    pub fn validate_symbol(symbol: &str) -> DataResult<()> {
        if symbol.is_empty() {
            return Err(DataError::validation_error("symbol", "Symbol cannot be empty"));
        }

        if symbol.len() > 10 {
            return Err(DataError::validation_error("symbol", "Symbol too long (max 10 chars)"));
        }

        if !symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
            return Err(DataError::validation_error(
                "symbol",
                "Symbol must be alphanumeric (with . or -)",
            ));
        }

        Ok(())
    }

    /// Validate a parsed quote before it enters a snapshot
    pub fn validate_quote(quote: &Quote) -> DataResult<()> {
        validate_symbol(&quote.symbol)?;

        if !quote.price.is_finite() || quote.price <= 0.0 {
            return Err(DataError::validation_error("price", "Price must be a positive number"));
        }

        if quote.volume < 0 {
            return Err(DataError::validation_error("volume", "Volume cannot be negative"));
        }

        if !quote.change.is_finite() || !quote.change_percent.is_finite() {
            return Err(DataError::validation_error("change", "Change fields must be finite"));
        }

        if quote.high < quote.low {
            return Err(DataError::validation_error(
                "high_low",
                "High price cannot be less than low price",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64, volume: i64) -> Quote {
        Quote {
            symbol: "SPY".to_string(),
            price,
            open: price,
            high: price * 1.01,
            low: price * 0.99,
            volume,
            change: 1.0,
            change_percent: 0.25,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn test_validate_symbol() {
        assert!(validation::validate_symbol("SPY").is_ok());
        assert!(validation::validate_symbol("BRK.B").is_ok());
        assert!(validation::validate_symbol("").is_err());
        assert!(validation::validate_symbol("WAYTOOLONGSYM").is_err());
        assert!(validation::validate_symbol("SP Y").is_err());
    }

    #[test]
    fn test_validate_quote_rejects_non_finite_price() {
        let mut q = quote(f64::NAN, 1000);
        assert!(validation::validate_quote(&q).is_err());
        q = quote(450.0, -5);
        assert!(validation::validate_quote(&q).is_err());
        q = quote(450.0, 1000);
        assert!(validation::validate_quote(&q).is_ok());
    }
}
