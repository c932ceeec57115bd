pub mod error;
pub mod types;

pub use error::{ChromaError, Result};
pub use types::{Collection, GetResult, Metadata, QueryResult};

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use types::{
    AddRequest, CreateCollectionRequest, DeleteRequest, GetRequest, QueryRequest, UpdateRequest,
};

pub struct ChromaClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChromaClient {
    pub fn new(host: &str, port: u16) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build Chroma HTTP client");
        Self {
            client,
            base_url: format!("http://{host}:{port}/api/v1"),
        }
    }

    /// Liveness probe with a tight deadline, for health endpoints.
    pub async fn heartbeat(&self) -> Result<()> {
        let url = format!("{}/heartbeat", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChromaError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }

    /// Get-or-create a collection by name. Metadata is only applied on
    /// first creation; Chroma ignores it for an existing collection.
    pub async fn get_or_create_collection(
        &self,
        name: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Collection> {
        let url = format!("{}/collections", self.base_url);
        let request = CreateCollectionRequest {
            name,
            metadata,
            get_or_create: true,
        };
        let resp = self.client.post(&url).json(&request).send().await?;
        let collection: Collection = decode(resp).await?;
        debug!(name, id = %collection.id, "Resolved Chroma collection");
        Ok(collection)
    }

    pub async fn add(
        &self,
        collection_id: &str,
        ids: &[String],
        embeddings: &[Vec<f32>],
        metadatas: Option<&[Metadata]>,
        documents: Option<&[String]>,
    ) -> Result<()> {
        let url = format!("{}/collections/{}/add", self.base_url, collection_id);
        let request = AddRequest {
            ids,
            embeddings,
            metadatas,
            documents,
        };
        let resp = self.client.post(&url).json(&request).send().await?;
        decode::<serde_json::Value>(resp).await?;
        Ok(())
    }

    /// Fetch records by id, or all records (up to `limit`) when `ids` is None.
    pub async fn get(
        &self,
        collection_id: &str,
        ids: Option<Vec<String>>,
        limit: Option<usize>,
    ) -> Result<GetResult> {
        let url = format!("{}/collections/{}/get", self.base_url, collection_id);
        let request = GetRequest {
            ids,
            limit,
            include: vec!["metadatas", "documents"],
        };
        let resp = self.client.post(&url).json(&request).send().await?;
        decode(resp).await
    }

    /// Replace the metadata of existing records.
    pub async fn update(
        &self,
        collection_id: &str,
        ids: &[String],
        metadatas: &[Metadata],
    ) -> Result<()> {
        let url = format!("{}/collections/{}/update", self.base_url, collection_id);
        let request = UpdateRequest { ids, metadatas };
        let resp = self.client.post(&url).json(&request).send().await?;
        decode::<serde_json::Value>(resp).await?;
        Ok(())
    }

    pub async fn delete(&self, collection_id: &str, ids: &[String]) -> Result<()> {
        let url = format!("{}/collections/{}/delete", self.base_url, collection_id);
        let request = DeleteRequest { ids };
        let resp = self.client.post(&url).json(&request).send().await?;
        decode::<serde_json::Value>(resp).await?;
        Ok(())
    }

    pub async fn count(&self, collection_id: &str) -> Result<usize> {
        let url = format!("{}/collections/{}/count", self.base_url, collection_id);
        let resp = self.client.get(&url).send().await?;
        decode(resp).await
    }

    /// Nearest-neighbor query with client-supplied embeddings.
    pub async fn query(
        &self,
        collection_id: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<QueryResult> {
        let url = format!("{}/collections/{}/query", self.base_url, collection_id);
        let request = QueryRequest {
            query_embeddings,
            n_results,
            include: vec!["metadatas", "documents", "distances"],
        };
        let resp = self.client.post(&url).json(&request).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status().as_u16();
    let success = resp.status().is_success();
    let body = resp.text().await?;
    decode_body(status, success, &body)
}

/// Decode a Chroma response body. Non-2xx carries the upstream body; 2xx
/// bodies are probed for an `{"error": ...}` envelope before success
/// decoding — some Chroma builds report failures with HTTP 200.
fn decode_body<T: DeserializeOwned>(status: u16, success: bool, body: &str) -> Result<T> {
    if !success {
        return Err(ChromaError::Api {
            status,
            message: body.to_string(),
        });
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = value.get("error") {
            if !error.is_null() {
                return Err(ChromaError::Api {
                    status,
                    message: error.to_string(),
                });
            }
        }
    }

    serde_json::from_str(body).map_err(|e| ChromaError::Parse(format!("{e}: {body}")))
}
