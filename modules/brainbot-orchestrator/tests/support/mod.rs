//! Fakes for the runner's ingest and generation seams.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use brainbot_common::{Article, DeduplicationDecision};
use brainbot_orchestrator::runner::{GenerationApi, IngestApi, ProcessResponse};
use tokio::sync::Notify;

#[derive(Default)]
pub struct FakeIngest {
    /// Articles returned by fetch.
    pub articles: Mutex<Vec<Article>>,
    /// Ids the process endpoint reports as "new" (with a presigned URL).
    pub new_ids: Mutex<HashSet<String>>,
    /// Ids whose process call fails with an infrastructure error.
    pub fail_ids: Mutex<HashSet<String>>,
    pub fail_fetch: AtomicBool,
    pub fail_clear: AtomicBool,
    pub clear_calls: AtomicUsize,
    pub process_calls: AtomicUsize,
    /// When set, fetch blocks until notified; used to hold a cycle open.
    pub hold_fetch: Mutex<Option<Arc<Notify>>>,
}

impl FakeIngest {
    pub fn with_articles(articles: Vec<Article>) -> Self {
        Self {
            articles: Mutex::new(articles),
            ..Default::default()
        }
    }

    pub fn mark_new(&self, id: &str) {
        self.new_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn mark_failing(&self, id: &str) {
        self.fail_ids.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl IngestApi for FakeIngest {
    async fn clear(&self) -> Result<()> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(anyhow!("redis unavailable"));
        }
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(&self, _feed_preset: &str, _count: usize) -> Result<Vec<Article>> {
        let hold = self.hold_fetch.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(anyhow!("feed unreachable"));
        }
        Ok(self.articles.lock().unwrap().clone())
    }

    async fn process(&self, article: &Article) -> Result<ProcessResponse> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ids.lock().unwrap().contains(&article.id) {
            return Err(anyhow!("vector store down"));
        }
        let is_new = self.new_ids.lock().unwrap().contains(&article.id);
        Ok(ProcessResponse {
            status: if is_new { "new" } else { "duplicate" }.to_string(),
            deduplication_result: DeduplicationDecision {
                is_duplicate: !is_new,
                checked_at: chrono::Utc::now(),
                ..Default::default()
            },
            presigned_url: is_new.then(|| format!("https://store.example/{}", article.id)),
        })
    }
}

#[derive(Default)]
pub struct FakeGeneration {
    pub calls: Mutex<Vec<(String, Option<String>, Vec<String>)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl GenerationApi for FakeGeneration {
    async fn generate(
        &self,
        uuid: &str,
        presigned_url: Option<&str>,
        article_urls: &[String],
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("generation service returned 503"));
        }
        self.calls.lock().unwrap().push((
            uuid.to_string(),
            presigned_url.map(str::to_string),
            article_urls.to_vec(),
        ));
        Ok(())
    }
}

pub fn article(id: &str, url: &str) -> Article {
    Article {
        id: id.to_string(),
        title: format!("Title {id}"),
        url: url.to_string(),
        full_content_text: format!("Body of {id}"),
        ..Default::default()
    }
}

pub fn broken_article(id: &str) -> Article {
    Article {
        id: id.to_string(),
        title: String::new(),
        url: format!("https://ex/{id}"),
        extraction_error: "fetch timed out".to_string(),
        ..Default::default()
    }
}
