use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Named product-tuning constants for the alert/play rule engine and the
/// derived-metric classifiers. These are display heuristics revisited by
/// product rather than values derived from data, so they live here by name.
pub mod thresholds {
    /// A mover qualifies as a breakout alert at this absolute move.
    pub const ALERT_MOVE_PCT: f64 = 10.0;
    /// Volume floor for breakout alerts.
    pub const ALERT_VOLUME_FLOOR: i64 = 500_000;
    /// Moves at or above this read as high-priority alerts.
    pub const ALERT_HIGH_PRIORITY_PCT: f64 = 15.0;
    /// Confidence clamp range and slope for alerts.
    pub const ALERT_CONFIDENCE_MIN: f64 = 60.0;
    pub const ALERT_CONFIDENCE_MAX: f64 = 95.0;
    pub const ALERT_CONFIDENCE_SLOPE: f64 = 2.0;
    /// Alerts returned per request.
    pub const ALERT_TOP_N: usize = 8;

    /// A mover qualifies as a play candidate at this absolute move.
    pub const PLAY_MOVE_PCT: f64 = 5.0;
    /// Volume floor for play candidates.
    pub const PLAY_VOLUME_FLOOR: i64 = 100_000;
    /// Confidence clamp range for plays.
    pub const PLAY_CONFIDENCE_MIN: f64 = 70.0;
    pub const PLAY_CONFIDENCE_MAX: f64 = 95.0;
    /// Confidence gained per percentage point of move.
    pub const PLAY_CONFIDENCE_SLOPE: f64 = 2.5;
    /// Plays returned per request.
    pub const PLAY_TOP_N: usize = 6;

    /// Entry/stop/target offsets from current price, long side
    /// (short side mirrors around 1.0).
    pub const PLAY_ENTRY_OFFSET: f64 = 0.995;
    pub const PLAY_STOP_OFFSET: f64 = 0.95;
    pub const PLAY_NEAR_TARGET_OFFSET: f64 = 1.04;
    pub const PLAY_TARGET_OFFSET: f64 = 1.08;

    /// Volatility-index regime cutoffs.
    pub const VOL_LOW: f64 = 15.0;
    pub const VOL_NORMAL: f64 = 20.0;
    pub const VOL_ELEVATED: f64 = 25.0;
    pub const VOL_HIGH: f64 = 30.0;
    /// Day-over-day volatility change inside this band reads as Stable.
    pub const VOL_STABLE_BAND: f64 = 0.5;

    /// Moves at or above this count as "strong" for the options-flow and
    /// social-sentiment heuristics.
    pub const STRONG_MOVE_PCT: f64 = 10.0;

    /// Courtesy delay between per-mover quote lookups; the upstream API
    /// enforces a request-rate ceiling.
    pub const MOVER_DETAIL_DELAY_MS: u64 = 250;
    /// Movers enriched with a detail quote at comprehensive depth.
    pub const MOVER_DETAIL_LIMIT: usize = 5;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub apis: ApiConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Market-data API key. Absence fails every data endpoint up front.
    pub market_data_api_key: Option<String>,
    pub market_data_base_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Generative-text API key. Absence fails AI endpoints up front.
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        // .env sets vars that aren't already present in the environment
        dotenv::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                bind: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .context("Invalid PORT value")?,
            },
            apis: ApiConfig {
                market_data_api_key: env::var("MARKET_DATA_API_KEY").ok(),
                market_data_base_url: env::var("MARKET_DATA_BASE_URL")
                    .unwrap_or_else(|_| "https://www.alphavantage.co/query".to_string()),
                request_timeout_seconds: env::var("MARKET_DATA_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid MARKET_DATA_TIMEOUT_SECONDS value")?,
            },
            llm: LlmConfig {
                api_key: env::var("GENERATIVE_API_KEY").ok(),
                api_base: env::var("GENERATIVE_API_BASE")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: env::var("GENERATIVE_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                timeout_seconds: env::var("GENERATIVE_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "45".to_string())
                    .parse()
                    .context("Invalid GENERATIVE_TIMEOUT_SECONDS value")?,
                max_tokens: env::var("GENERATIVE_MAX_TOKENS")
                    .unwrap_or_else(|_| "2048".to_string())
                    .parse()
                    .context("Invalid GENERATIVE_MAX_TOKENS value")?,
            },
        };

        Ok(config)
    }

    /// Both upstream credentials are configured; required for AI endpoints.
    pub fn ai_ready(&self) -> bool {
        self.apis.market_data_api_key.is_some() && self.llm.api_key.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1".to_string(),
                port: 8080,
            },
            apis: ApiConfig {
                market_data_api_key: None,
                market_data_base_url: "https://www.alphavantage.co/query".to_string(),
                request_timeout_seconds: 30,
            },
            llm: LlmConfig {
                api_key: None,
                api_base: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_seconds: 45,
                max_tokens: 2048,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_not_ai_ready() {
        let config = Config::default();
        assert!(!config.ai_ready());
    }

    #[test]
    fn test_ai_ready_requires_both_keys() {
        let mut config = Config::default();
        config.apis.market_data_api_key = Some("md-key".to_string());
        assert!(!config.ai_ready());

        config.llm.api_key = Some("gen-key".to_string());
        assert!(config.ai_ready());
    }
}
