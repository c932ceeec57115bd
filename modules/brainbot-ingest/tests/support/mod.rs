//! In-memory fakes of the vector store and exact-match filter seams.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use brainbot_common::{Article, BrainbotError};
use brainbot_ingest::filter::ExactMatchFilter;
use brainbot_ingest::index::{SimilarDocument, StoredDocument, VectorStore};
use chroma_client::Metadata;

/// Deterministic stand-in for cosine similarity: shared-prefix ratio.
/// Identical texts score 1.0; a short suffix added to a long text stays
/// close to 1.0; unrelated texts score near 0.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let prefix = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    (2 * prefix) as f32 / (a.len() + b.len()) as f32
}

#[derive(Default)]
pub struct FakeIndex {
    pub docs: Mutex<Vec<(String, String, Metadata)>>,
    pub query_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub fail_updates: AtomicBool,
    /// When set, every query hit reports this distance instead of the
    /// text-similarity-derived one.
    pub forced_distance: Mutex<Option<f32>>,
}

impl FakeIndex {
    pub fn seed(&self, id: &str, content: &str, metadata: Metadata) {
        self.docs
            .lock()
            .unwrap()
            .push((id.to_string(), content.to_string(), metadata));
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, _)| id.clone())
            .collect()
    }

    pub fn metadata_of(&self, id: &str) -> Option<Metadata> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .find(|(doc_id, _, _)| doc_id == id)
            .map(|(_, _, m)| m.clone())
    }
}

#[async_trait]
impl VectorStore for FakeIndex {
    async fn query_similar(
        &self,
        text: &str,
        n: usize,
    ) -> Result<Vec<SimilarDocument>, BrainbotError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let forced = *self.forced_distance.lock().unwrap();
        let mut hits: Vec<SimilarDocument> = self
            .docs
            .lock()
            .unwrap()
            .iter()
            .map(|(id, content, metadata)| SimilarDocument {
                id: id.clone(),
                distance: forced.unwrap_or_else(|| 1.0 - text_similarity(text, content)),
                metadata: metadata.clone(),
                document: content.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits.truncate(n);
        Ok(hits)
    }

    async fn add_document(
        &self,
        id: &str,
        content: &str,
        metadata: Metadata,
    ) -> Result<(), BrainbotError> {
        self.seed(id, content, metadata);
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, BrainbotError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .find(|(doc_id, _, _)| doc_id == id)
            .map(|(id, content, metadata)| StoredDocument {
                id: id.clone(),
                metadata: metadata.clone(),
                document: content.clone(),
            }))
    }

    async fn update_document(&self, id: &str, metadata: Metadata) -> Result<(), BrainbotError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(BrainbotError::VectorStore("update refused".to_string()));
        }
        let mut docs = self.docs.lock().unwrap();
        match docs.iter_mut().find(|(doc_id, _, _)| doc_id == id) {
            Some((_, _, existing)) => {
                *existing = metadata;
                Ok(())
            }
            None => Err(BrainbotError::VectorStore(format!("no document {id}"))),
        }
    }

    async fn delete_document(&self, id: &str) -> Result<(), BrainbotError> {
        self.docs.lock().unwrap().retain(|(doc_id, _, _)| doc_id != id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, BrainbotError> {
        Ok(self.docs.lock().unwrap().len())
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredDocument>, BrainbotError> {
        let docs = self.docs.lock().unwrap();
        let take = limit.unwrap_or(docs.len());
        Ok(docs
            .iter()
            .take(take)
            .map(|(id, content, metadata)| StoredDocument {
                id: id.clone(),
                metadata: metadata.clone(),
                document: content.clone(),
            })
            .collect())
    }

    async fn clear_collection(&self) -> Result<(), BrainbotError> {
        self.docs.lock().unwrap().clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrainbotError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFilter {
    pub keys: Mutex<std::collections::HashSet<String>>,
    pub broken: AtomicBool,
}

impl FakeFilter {
    pub fn preload(&self, key: &str) {
        self.keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ExactMatchFilter for FakeFilter {
    async fn exists(&self, key: &str) -> Result<bool, BrainbotError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(BrainbotError::ExactMatch("connection refused".to_string()));
        }
        Ok(self.keys.lock().unwrap().contains(key))
    }

    async fn add(&self, key: &str) -> Result<(), BrainbotError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(BrainbotError::ExactMatch("connection refused".to_string()));
        }
        self.keys.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), BrainbotError> {
        self.keys.lock().unwrap().clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrainbotError> {
        Ok(())
    }
}

pub fn make_article(id: &str, title: &str, url: &str, content: &str) -> Article {
    Article {
        id: id.to_string(),
        title: title.to_string(),
        url: url.to_string(),
        full_content_text: content.to_string(),
        ..Default::default()
    }
}

/// Metadata shaped like a stored document, stamped at `reference`.
pub fn stored_metadata(article_id: &str, reference: chrono::DateTime<chrono::Utc>) -> Metadata {
    let stamp = reference.to_rfc3339();
    let mut metadata = Metadata::new();
    metadata.insert("article_id".to_string(), article_id.to_string().into());
    metadata.insert("added_at".to_string(), stamp.clone().into());
    metadata.insert("last_retrieved_at".to_string(), stamp.clone().into());
    metadata.insert("last_update".to_string(), stamp.into());
    metadata
}
