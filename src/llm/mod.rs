//! Generative-text API integration.
//! One client per process; requests carry a hard timeout and no retries.
//! A failed generation is terminal for the request that asked for it.

pub mod extract;

pub use extract::{extract_json, ExtractError};

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client as OpenAIClient,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::LlmConfig;

/// Generated text with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub total_tokens: Option<u32>,
}

/// Client for the generative-text API
#[derive(Clone)]
pub struct LlmClient {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
    timeout_seconds: u64,
    max_tokens: u32,
}

impl LlmClient {
    /// Construct from config. Fails when the credential is absent; AI
    /// endpoints treat that as a hard configuration error.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .context("GENERATIVE_API_KEY is required but not set")?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.api_base);

        Ok(Self {
            client: OpenAIClient::with_config(openai_config),
            model: config.model.clone(),
            timeout_seconds: config.timeout_seconds,
            max_tokens: config.max_tokens,
        })
    }

    /// Generate a completion for one prompt
    pub async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        info!(
            model = %self.model,
            prompt_chars = prompt.len(),
            "requesting generation"
        );

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .context("Failed to build chat message")?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(self.max_tokens)
            .messages([message.into()])
            .build()
            .context("Failed to build generation request")?;

        let response = match timeout(
            Duration::from_secs(self.timeout_seconds),
            self.client.chat().create(request),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("generation failed: {}", e);
                return Err(anyhow::anyhow!("Generative API error: {e}"));
            }
            Err(_) => {
                error!("generation timed out after {}s", self.timeout_seconds);
                return Err(anyhow::anyhow!(
                    "Generation timed out after {} seconds",
                    self.timeout_seconds
                ));
            }
        };

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .context("Generative API returned no content")?;

        info!(
            response_chars = content.len(),
            "generation complete"
        );

        Ok(LlmResponse {
            content,
            model: response.model,
            total_tokens: response.usage.map(|u| u.total_tokens),
        })
    }
}
