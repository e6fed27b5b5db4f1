use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::data::{MarketDataClient, SnapshotBuilder};
use crate::llm::LlmClient;

use super::error::ApiError;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
pub struct AppState {
    pub config: Config,
    pub market: Arc<MarketDataClient>,
    pub snapshots: SnapshotBuilder,

    /// Present only when a generative key is configured.
    pub llm: Option<LlmClient>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let market = Arc::new(MarketDataClient::new(
            config.apis.market_data_base_url.clone(),
            config.apis.market_data_api_key.clone(),
            config.apis.request_timeout_seconds,
        )?);
        let snapshots = SnapshotBuilder::new(Arc::clone(&market));

        let llm = if config.llm.api_key.is_some() {
            Some(LlmClient::from_config(&config.llm)?)
        } else {
            tracing::warn!("GENERATIVE_API_KEY not set; AI endpoints will return 500");
            None
        };

        Ok(Arc::new(Self {
            config,
            market,
            snapshots,
            llm,
        }))
    }

    /// Gate for data endpoints. Checked before any outbound call.
    pub fn require_market(&self) -> Result<(), ApiError> {
        if self.config.apis.market_data_api_key.is_some() {
            Ok(())
        } else {
            Err(ApiError::Config(
                "MARKET_DATA_API_KEY is not configured".to_string(),
            ))
        }
    }

    /// Gate for AI endpoints: both credentials must be present.
    pub fn require_ai(&self) -> Result<&LlmClient, ApiError> {
        if !self.config.ai_ready() {
            return Err(ApiError::Config(
                "AI endpoints require MARKET_DATA_API_KEY and GENERATIVE_API_KEY".to_string(),
            ));
        }
        self.llm.as_ref().ok_or_else(|| {
            ApiError::Config("Generative client is not configured".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys(market: Option<&str>, generative: Option<&str>) -> Config {
        let mut config = Config::default();
        config.apis.market_data_api_key = market.map(String::from);
        config.llm.api_key = generative.map(String::from);
        config
    }

    #[test]
    fn test_unconfigured_deployment_fails_both_gates() {
        let state = AppState::new(config_with_keys(None, None)).expect("state builds");
        assert!(matches!(state.require_market(), Err(ApiError::Config(_))));
        assert!(state.require_ai().is_err());
    }

    #[test]
    fn test_market_key_alone_does_not_satisfy_ai_gate() {
        let state = AppState::new(config_with_keys(Some("mk"), None)).expect("state builds");
        assert!(state.require_market().is_ok());
        assert!(state.require_ai().is_err());
    }

    #[test]
    fn test_both_keys_satisfy_ai_gate() {
        let state = AppState::new(config_with_keys(Some("mk"), Some("gk"))).expect("state builds");
        assert!(state.require_ai().is_ok());
    }
}
