use std::time::Duration;

use async_trait::async_trait;
use brainbot_common::BrainbotError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::{check_arity, EmbeddingProvider};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    api_key: String,
    org_id: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, org_id: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build OpenAI HTTP client");
        Self {
            api_key: api_key.to_string(),
            org_id: org_id.to_string(),
            model: DEFAULT_MODEL.to_string(),
            http,
            base_url: OPENAI_API_URL.to_string(),
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
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, BrainbotError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, count = texts.len(), "OpenAI embedding request");

        let url = format!("{}/embeddings", self.base_url);
        let mut request = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: &texts,
            });
        if !self.org_id.is_empty() {
            request = request.header("OpenAI-Organization", &self.org_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BrainbotError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BrainbotError::Embedding(format!(
                "OpenAI embedding error ({status}): {body}"
            )));
        }

        let decoded: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| BrainbotError::Embedding(e.to_string()))?;

        check_arity(texts.len(), decoded.data.len())?;

        // The API documents response order == input order, but carries an
        // explicit index; honor it.
        let mut vectors = vec![Vec::new(); texts.len()];
        for item in decoded.data {
            if item.index >= vectors.len() {
                return Err(BrainbotError::Embedding(format!(
                    "OpenAI returned out-of-range index {}",
                    item.index
                )));
            }
            vectors[item.index] = item.embedding;
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
