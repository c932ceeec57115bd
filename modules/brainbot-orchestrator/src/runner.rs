//! Workflow runner: drives one cycle end-to-end against the ingestion API
//! and the generation service, recording progress in the state manager.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use brainbot_common::{Article, DeduplicationDecision};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{ArticleOutcome, StateManager, WorkflowStage};

const DEFAULT_FETCH_COUNT: usize = 10;

/// Response of the ingestion process endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessResponse {
    pub status: String,
    pub deduplication_result: DeduplicationDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
}

/// Client surface of the ingestion service the runner depends on.
#[async_trait]
pub trait IngestApi: Send + Sync {
    async fn clear(&self) -> Result<()>;
    async fn fetch(&self, feed_preset: &str, count: usize) -> Result<Vec<Article>>;
    async fn process(&self, article: &Article) -> Result<ProcessResponse>;
}

/// Client surface of the generation service.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    async fn generate(
        &self,
        uuid: &str,
        presigned_url: Option<&str>,
        article_urls: &[String],
    ) -> Result<()>;
}

// --- HTTP implementations ---

pub struct IngestClient {
    http: reqwest::Client,
    base_url: String,
}

impl IngestClient {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build ingest HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IngestApi for IngestClient {
    async fn clear(&self) -> Result<()> {
        let url = format!("{}/api/deduplication/clear", self.base_url);
        let resp = self.http.post(&url).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn fetch(&self, feed_preset: &str, count: usize) -> Result<Vec<Article>> {
        let url = format!("{}/fetch", self.base_url);
        // Fetch plus extraction can exceed the default client deadline.
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(120))
            .json(&json!({"feed_preset": feed_preset, "count": count}))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn process(&self, article: &Article) -> Result<ProcessResponse> {
        let url = format!("{}/api/deduplication/process", self.base_url);
        let resp = self.http.post(&url).json(article).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
}

impl GenerationClient {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build generation HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GenerationApi for GenerationClient {
    async fn generate(
        &self,
        uuid: &str,
        presigned_url: Option<&str>,
        article_urls: &[String],
    ) -> Result<()> {
        let url = format!("{}/generate", self.base_url);
        let mut body = json!({"uuid": uuid});
        if let Some(presigned) = presigned_url {
            body["presigned_url"] = json!(presigned);
        }
        if !article_urls.is_empty() {
            body["article_urls"] = json!(article_urls);
        }
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if status != reqwest::StatusCode::ACCEPTED && !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Generation service returned {status}: {text}"));
        }
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!("Ingest API returned {status}: {body}"));
    }
    Ok(resp)
}

// --- Runner ---

pub struct WorkflowRunner {
    state: Arc<StateManager>,
    ingest: Arc<dyn IngestApi>,
    generation: Arc<dyn GenerationApi>,
}

impl WorkflowRunner {
    pub fn new(
        state: Arc<StateManager>,
        ingest: Arc<dyn IngestApi>,
        generation: Arc<dyn GenerationApi>,
    ) -> Self {
        Self {
            state,
            ingest,
            generation,
        }
    }

    /// Full cycle: clear caches, then fetch → deduplicate → send.
    pub async fn run(&self, feed: &str) {
        if let Err(e) = self.clear_step().await {
            self.state.set_error(format!("Cache clear failed: {e}")).await;
            return;
        }
        self.cycle(feed).await;
    }

    /// Refresh cycle: keep the stored set, fetch → deduplicate → send.
    pub async fn run_refresh(&self, feed: &str) {
        self.cycle(feed).await;
    }

    async fn clear_step(&self) -> Result<()> {
        self.state.set_stage(WorkflowStage::Clearing).await;
        self.state.add_log("Clearing deduplication caches").await;
        self.ingest.clear().await
    }

    async fn cycle(&self, feed: &str) {
        let articles = match self.fetch_step(feed).await {
            Ok(articles) => articles,
            Err(e) => {
                self.state.set_error(format!("Feed fetch failed: {e}")).await;
                return;
            }
        };

        let outcomes = self.dedup_step(&articles).await;

        if let Err(e) = self.send_step(&outcomes).await {
            self.state
                .set_error(format!("Generation request failed: {e}"))
                .await;
        }
    }

    async fn fetch_step(&self, feed: &str) -> Result<Vec<Article>> {
        self.state.set_stage(WorkflowStage::Fetching).await;
        let scope = if feed.is_empty() { "all presets" } else { feed };
        self.state
            .add_log(format!("Fetching articles ({scope})"))
            .await;

        let articles = self.ingest.fetch(feed, DEFAULT_FETCH_COUNT).await?;
        info!(count = articles.len(), "Fetched articles");
        self.state
            .add_log(format!("Fetched {} articles", articles.len()))
            .await;
        self.state.set_articles(articles.clone()).await;
        Ok(articles)
    }

    /// Stream every article through the process endpoint. Per-article
    /// failures never abort the cycle: articles that arrived broken are
    /// marked "failed", infrastructure errors mark that article "error".
    async fn dedup_step(&self, articles: &[Article]) -> Vec<ArticleOutcome> {
        self.state.set_stage(WorkflowStage::Deduplicating).await;
        self.state.add_log("Deduplicating articles").await;

        let mut outcomes = Vec::with_capacity(articles.len());
        for article in articles {
            if article.best_content().is_empty() && !article.extraction_error.is_empty() {
                outcomes.push(ArticleOutcome {
                    article_id: article.id.clone(),
                    url: article.url.clone(),
                    status: "failed".to_string(),
                    presigned_url: None,
                    detail: Some(article.extraction_error.clone()),
                });
                continue;
            }

            match self.ingest.process(article).await {
                Ok(response) => outcomes.push(ArticleOutcome {
                    article_id: article.id.clone(),
                    url: article.url.clone(),
                    status: response.status,
                    presigned_url: response.presigned_url,
                    detail: None,
                }),
                Err(e) => {
                    warn!(id = %article.id, error = %e, "Article processing failed");
                    outcomes.push(ArticleOutcome {
                        article_id: article.id.clone(),
                        url: article.url.clone(),
                        status: "error".to_string(),
                        presigned_url: None,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }

        let new = outcomes.iter().filter(|o| o.status == "new").count();
        let duplicate = outcomes.iter().filter(|o| o.status == "duplicate").count();
        self.state
            .add_log(format!(
                "Deduplication done: {new} new, {duplicate} duplicate, {} other",
                outcomes.len() - new - duplicate
            ))
            .await;
        self.state.set_dedup_results(outcomes.clone()).await;
        outcomes
    }

    /// Issue one generation request covering the cycle's new articles, or
    /// complete immediately when nothing new came in.
    async fn send_step(&self, outcomes: &[ArticleOutcome]) -> Result<()> {
        self.state.set_stage(WorkflowStage::Sending).await;

        let new_outcomes: Vec<&ArticleOutcome> =
            outcomes.iter().filter(|o| o.status == "new").collect();

        if new_outcomes.is_empty() {
            self.state
                .add_log("No new articles, skipping generation")
                .await;
            self.state.set_stage(WorkflowStage::Complete).await;
            return Ok(());
        }

        let presigned_url = new_outcomes
            .iter()
            .find_map(|o| o.presigned_url.as_deref());
        let article_urls: Vec<String> = new_outcomes
            .iter()
            .filter(|o| !o.url.is_empty())
            .map(|o| o.url.clone())
            .collect();

        let uuid = Uuid::new_v4().to_string();
        self.state
            .add_log(format!(
                "Requesting generation for {} new articles (uuid {uuid})",
                new_outcomes.len()
            ))
            .await;

        self.generation
            .generate(&uuid, presigned_url, &article_urls)
            .await?;

        self.state.set_generation_uuid(&uuid).await;
        self.state.set_stage(WorkflowStage::Waiting).await;
        self.state
            .add_log("Generation request accepted, waiting for completion")
            .await;
        Ok(())
    }
}
