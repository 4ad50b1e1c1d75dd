//! Anthropic Messages API gateway
//!
//! Each call is stateless: one user message in, one text block out.
//! Rate limits and server errors are retried here so the loop never has to.

use crate::auth;
use crate::gateway::GenerationGateway;
use crate::types::{
    AnthropicMessage, AnthropicRequest, AnthropicResponse, GenerationOptions,
};
use async_trait::async_trait;
use taskloop_core::{GenerationConfig, ModelTier, Result, TaskloopError};
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// Retry configuration
const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

/// Generation gateway backed by the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicGateway {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    standard_model: String,
    advanced_model: String,
}

impl AnthropicGateway {
    /// Create a gateway with the default model for each tier
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = GenerationConfig::default();
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: ANTHROPIC_API_URL.to_string(),
            standard_model: defaults.standard_model,
            advanced_model: defaults.advanced_model,
        }
    }

    /// Create a gateway from configuration, resolving the API key
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = auth::get_api_key(&config.api_key_env)?;
        Ok(Self::new(api_key).with_models(&config.standard_model, &config.advanced_model))
    }

    /// Override the concrete model behind each tier
    pub fn with_models(mut self, standard: &str, advanced: &str) -> Self {
        self.standard_model = standard.to_string();
        self.advanced_model = advanced.to_string();
        self
    }

    /// Override the endpoint (proxies, tests)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Advanced => &self.advanced_model,
        }
    }

    fn build_request(&self, prompt: &str, options: &GenerationOptions) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model_name(options.model_tier).to_string(),
            max_tokens: options.max_output_tokens,
            temperature: options.temperature,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

#[async_trait]
impl GenerationGateway for AnthropicGateway {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let request = self.build_request(prompt, options);
        tracing::debug!(
            model = %request.model,
            tier = %options.model_tier,
            prompt_chars = prompt.len(),
            "Sending generation request"
        );

        let mut retries = 0;
        let mut backoff_secs = INITIAL_BACKOFF_SECS;

        loop {
            let response = self
                .http
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| TaskloopError::Generation(format!("Failed to send request: {}", e)))?;

            let status = response.status();

            // Rate limited: honour retry-after when present
            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RETRIES {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown".to_string());
                    return Err(TaskloopError::Generation(format!(
                        "Rate limit exceeded after {} retries. Last error: {}",
                        MAX_RETRIES, error_text
                    )));
                }

                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs);

                tracing::warn!(
                    "Rate limited (429). Waiting {} seconds before retry {}/{}",
                    wait_secs,
                    retries,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());

                if status.is_server_error() && retries < MAX_RETRIES {
                    retries += 1;
                    tracing::warn!(
                        "Server error ({}). Waiting {} seconds before retry {}/{}",
                        status,
                        backoff_secs,
                        retries,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }

                return Err(TaskloopError::Generation(format!(
                    "Anthropic API error {}: {}",
                    status, error_text
                )));
            }

            let parsed: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| TaskloopError::Generation(format!("Failed to parse response: {}", e)))?;

            let output = parsed
                .content
                .iter()
                .find(|block| block.content_type == "text")
                .map(|block| block.text.trim().to_string())
                .ok_or_else(|| TaskloopError::Generation("No text content in response".to_string()))?;

            if let Some(usage) = &parsed.usage {
                tracing::debug!(
                    "Generation complete ({} chars, {} input tokens, {} output tokens)",
                    output.len(),
                    usage.input_tokens,
                    usage.output_tokens
                );
            }

            return Ok(output);
        }
    }
}
