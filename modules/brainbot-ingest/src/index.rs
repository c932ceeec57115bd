//! Vector store adapter: capability trait plus the Chroma-backed
//! implementation with client-supplied embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use brainbot_common::BrainbotError;
use chroma_client::{ChromaClient, Metadata};
use embed_client::EmbeddingProvider;
use tokio::sync::OnceCell;
use tracing::debug;

/// One stored record: id plus whatever metadata/document the backend kept.
#[derive(Debug, Clone, Default)]
pub struct StoredDocument {
    pub id: String,
    pub metadata: Metadata,
    pub document: String,
}

/// One nearest-neighbor hit. `distance = 1 − cosine_similarity`.
#[derive(Debug, Clone)]
pub struct SimilarDocument {
    pub id: String,
    pub distance: f32,
    pub metadata: Metadata,
    pub document: String,
}

/// Capability set over the article vector collection. Write and query
/// operations need an embedding provider; `count`, `list` and
/// `clear_collection` work through the read-only construction path.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query_similar(
        &self,
        text: &str,
        n: usize,
    ) -> Result<Vec<SimilarDocument>, BrainbotError>;

    async fn add_document(
        &self,
        id: &str,
        content: &str,
        metadata: Metadata,
    ) -> Result<(), BrainbotError>;

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, BrainbotError>;

    async fn update_document(&self, id: &str, metadata: Metadata) -> Result<(), BrainbotError>;

    async fn delete_document(&self, id: &str) -> Result<(), BrainbotError>;

    async fn count(&self) -> Result<usize, BrainbotError>;

    async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>, BrainbotError>;

    async fn clear_collection(&self) -> Result<(), BrainbotError>;

    /// Cheap liveness probe for health endpoints.
    async fn ping(&self) -> Result<(), BrainbotError>;

    /// Release any backend resources. REST backends have nothing to do.
    async fn close(&self) -> Result<(), BrainbotError> {
        Ok(())
    }
}

pub struct ChromaStore {
    client: ChromaClient,
    collection_name: String,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    collection_id: OnceCell<String>,
}

impl ChromaStore {
    pub fn new(
        host: &str,
        port: u16,
        collection_name: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            client: ChromaClient::new(host, port),
            collection_name: collection_name.to_string(),
            embedder: Some(embedder),
            collection_id: OnceCell::new(),
        }
    }

    /// Construction path without embedding credentials. Supports `count`,
    /// `list`, `clear_collection` and `ping`; anything that needs an
    /// embedding fails with a vector store error.
    pub fn read_only(host: &str, port: u16, collection_name: &str) -> Self {
        Self {
            client: ChromaClient::new(host, port),
            collection_name: collection_name.to_string(),
            embedder: None,
            collection_id: OnceCell::new(),
        }
    }

    fn embedder(&self) -> Result<&Arc<dyn EmbeddingProvider>, BrainbotError> {
        self.embedder.as_ref().ok_or_else(|| {
            BrainbotError::VectorStore(
                "no embedding provider configured (read-only store)".to_string(),
            )
        })
    }

    /// Lazily resolve the collection (get-or-create) and cache its id.
    /// Created with cosine space so distances are `1 − cosine_similarity`.
    async fn collection_id(&self) -> Result<&str, BrainbotError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let mut metadata = Metadata::new();
                metadata.insert("hnsw:space".to_string(), "cosine".into());
                if let Some(embedder) = &self.embedder {
                    metadata.insert(
                        "embedding_model".to_string(),
                        embedder.model_name().into(),
                    );
                }
                let collection = self
                    .client
                    .get_or_create_collection(&self.collection_name, Some(&metadata))
                    .await
                    .map_err(|e| BrainbotError::VectorStore(e.to_string()))?;
                Ok::<_, BrainbotError>(collection.id)
            })
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn query_similar(
        &self,
        text: &str,
        n: usize,
    ) -> Result<Vec<SimilarDocument>, BrainbotError> {
        let embedding = self
            .embedder()?
            .embed_batch(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrainbotError::Embedding("provider returned no vector".to_string()))?;

        let collection_id = self.collection_id().await?;
        let result = self
            .client
            .query(collection_id, &[embedding], n)
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))?;

        // Parallel arrays, one inner array per query vector; we sent one.
        let ids = result.ids.into_iter().next().unwrap_or_default();
        let distances = result
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = result
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();
        let documents = result
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let hits = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| SimilarDocument {
                id,
                distance: distances.get(i).copied().unwrap_or(1.0),
                metadata: metadatas.get(i).cloned().flatten().unwrap_or_default(),
                document: documents.get(i).cloned().flatten().unwrap_or_default(),
            })
            .collect();
        Ok(hits)
    }

    async fn add_document(
        &self,
        id: &str,
        content: &str,
        metadata: Metadata,
    ) -> Result<(), BrainbotError> {
        let embedding = self
            .embedder()?
            .embed_batch(vec![content.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrainbotError::Embedding("provider returned no vector".to_string()))?;

        let collection_id = self.collection_id().await?;
        self.client
            .add(
                collection_id,
                &[id.to_string()],
                &[embedding],
                Some(&[metadata]),
                Some(&[content.to_string()]),
            )
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))?;
        debug!(id, "Added document to vector store");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, BrainbotError> {
        let collection_id = self.collection_id().await?;
        let result = self
            .client
            .get(collection_id, Some(vec![id.to_string()]), None)
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))?;

        let Some(found_id) = result.ids.into_iter().next() else {
            return Ok(None);
        };
        let metadata = result
            .metadatas
            .and_then(|m| m.into_iter().next())
            .flatten()
            .unwrap_or_default();
        let document = result
            .documents
            .and_then(|d| d.into_iter().next())
            .flatten()
            .unwrap_or_default();
        Ok(Some(StoredDocument {
            id: found_id,
            metadata,
            document,
        }))
    }

    async fn update_document(&self, id: &str, metadata: Metadata) -> Result<(), BrainbotError> {
        let collection_id = self.collection_id().await?;
        self.client
            .update(collection_id, &[id.to_string()], &[metadata])
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))
    }

    async fn delete_document(&self, id: &str) -> Result<(), BrainbotError> {
        let collection_id = self.collection_id().await?;
        self.client
            .delete(collection_id, &[id.to_string()])
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))
    }

    async fn count(&self) -> Result<usize, BrainbotError> {
        let collection_id = self.collection_id().await?;
        self.client
            .count(collection_id)
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>, BrainbotError> {
        let collection_id = self.collection_id().await?;
        let result = self
            .client
            .get(collection_id, None, limit)
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))?;

        let metadatas = result.metadatas.unwrap_or_default();
        let documents = result.documents.unwrap_or_default();
        let docs = result
            .ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| StoredDocument {
                id,
                metadata: metadatas.get(i).cloned().flatten().unwrap_or_default(),
                document: documents.get(i).cloned().flatten().unwrap_or_default(),
            })
            .collect();
        Ok(docs)
    }

    /// Deleting from an already-empty collection is a success.
    async fn clear_collection(&self) -> Result<(), BrainbotError> {
        let collection_id = self.collection_id().await?;
        let existing = self
            .client
            .get(collection_id, None, None)
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))?;
        if existing.ids.is_empty() {
            return Ok(());
        }
        self.client
            .delete(collection_id, &existing.ids)
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))
    }

    async fn ping(&self) -> Result<(), BrainbotError> {
        self.client
            .heartbeat()
            .await
            .map_err(|e| BrainbotError::VectorStore(e.to_string()))
    }
}
