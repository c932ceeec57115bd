use std::time::Duration;

use async_trait::async_trait;
use brainbot_common::BrainbotError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::{check_arity, EmbeddingProvider};

const COHERE_API_URL: &str = "https://api.cohere.ai/v1";
const DEFAULT_MODEL: &str = "embed-english-v3.0";

/// Embedding provider backed by the Cohere embed API.
pub struct CohereEmbedder {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl CohereEmbedder {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build Cohere HTTP client");
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            http,
            base_url: COHERE_API_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        if !model.is_empty() {
            self.model = model.to_string();
        }
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, BrainbotError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, count = texts.len(), "Cohere embedding request");

        let url = format!("{}/embed", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                texts: &texts,
                model: &self.model,
                input_type: "search_document",
            })
            .send()
            .await
            .map_err(|e| BrainbotError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BrainbotError::Embedding(format!(
                "Cohere embed error ({status}): {body}"
            )));
        }

        let decoded: EmbedResponse = response
            .json()
            .await
            .map_err(|e| BrainbotError::Embedding(e.to_string()))?;

        check_arity(texts.len(), decoded.embeddings.len())?;
        Ok(decoded.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
