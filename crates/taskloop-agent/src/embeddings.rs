//! OpenAI embeddings client

use async_trait::async_trait;
use taskloop_core::{Result, SemanticConfig, TaskloopError};

use crate::auth;
use crate::types::{EmbeddingRequest, EmbeddingResponse};
use crate::vector::Embedder;

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    /// Create an embedder from configuration, resolving the API key
    pub fn from_config(config: &SemanticConfig) -> Result<Self> {
        let api_key = auth::get_api_key(&config.api_key_env)?;
        Ok(Self::new(api_key, &config.embedding_model, &config.base_url))
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

/// Newlines degrade embedding quality for this model family
fn normalize_input(text: &str) -> String {
    text.replace('\n', " ")
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: vec![normalize_input(text)],
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TaskloopError::Vector(format!("Failed to send embedding request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(TaskloopError::Vector(format!(
                "Embedding API error {}: {}",
                status, error_text
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| TaskloopError::Vector(format!("Failed to parse embedding response: {}", e)))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| TaskloopError::Vector("Embedding response had no data".to_string()))
    }
}
