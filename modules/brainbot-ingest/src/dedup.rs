//! Two-tier duplicate detection.
//!
//! Tier 1 is the probabilistic exact-match filter (URL + normalized title);
//! tier 2 is vector similarity with a TTL window. The deduplicator is
//! stateless between calls; its authority lives in the vector store and the
//! filter.

use std::sync::Arc;

use brainbot_common::{normalize_title, Article, BrainbotError, Config, DeduplicationDecision};
use chrono::{DateTime, Duration, Utc};
use chroma_client::Metadata;
use tracing::{info, warn};

use crate::filter::ExactMatchFilter;
use crate::index::{SimilarDocument, VectorStore};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;
pub const DEFAULT_MAX_CANDIDATES: usize = 5;
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub similarity_threshold: f32,
    pub max_candidates: usize,
    pub ttl: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }
}

impl DedupConfig {
    /// Environment overrides; zero means "use the built-in default".
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            similarity_threshold: if config.similarity_threshold > 0.0 {
                config.similarity_threshold
            } else {
                defaults.similarity_threshold
            },
            max_candidates: if config.max_candidates > 0 {
                config.max_candidates
            } else {
                defaults.max_candidates
            },
            ttl: defaults.ttl,
        }
    }
}

pub struct Deduplicator {
    index: Arc<dyn VectorStore>,
    filter: Arc<dyn ExactMatchFilter>,
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(
        index: Arc<dyn VectorStore>,
        filter: Arc<dyn ExactMatchFilter>,
        config: DedupConfig,
    ) -> Self {
        Self {
            index,
            filter,
            config,
        }
    }

    /// Duplicate decision without growing the stored set: no insertion and
    /// no filter writes. Stale candidates are still evicted and a matched
    /// document still gets its access timestamps refreshed.
    pub async fn check_article(
        &self,
        article: &Article,
    ) -> Result<DeduplicationDecision, BrainbotError> {
        let (decision, _) = self.evaluate(article).await?;
        Ok(decision)
    }

    /// The full per-article contract: decide, then persist a non-duplicate
    /// into the vector store and the exact-match filter.
    pub async fn process_article(
        &self,
        article: &Article,
    ) -> Result<DeduplicationDecision, BrainbotError> {
        let (decision, has_content) = self.evaluate(article).await?;

        if !decision.is_duplicate && has_content {
            self.insert_article(article).await?;
        }
        Ok(decision)
    }

    /// Insert an article into both tiers unconditionally. Used by the
    /// non-duplicate path of `process_article` and the direct add endpoint.
    pub async fn insert_article(&self, article: &Article) -> Result<(), BrainbotError> {
        let content = article.best_content().to_string();
        if content.is_empty() {
            return Err(BrainbotError::Validation(
                "article has no content to add".to_string(),
            ));
        }

        let now = Utc::now();
        self.index
            .add_document(&article.id, &content, document_metadata(article, now))
            .await?;

        // Filter failures must not undo the vector insert.
        if !article.url.is_empty() {
            if let Err(e) = self.filter.add(&article.url).await {
                warn!(error = %e, "Failed to add URL to exact-match filter");
            }
        }
        let title_key = normalize_title(&article.title);
        if !title_key.is_empty() {
            if let Err(e) = self.filter.add(&title_key).await {
                warn!(error = %e, "Failed to add title to exact-match filter");
            }
        }
        Ok(())
    }

    /// Steps 1–5 of the decision; returns whether the article had usable
    /// content at all (step 1).
    async fn evaluate(
        &self,
        article: &Article,
    ) -> Result<(DeduplicationDecision, bool), BrainbotError> {
        let now = Utc::now();
        let content = article.best_content().to_string();
        if content.is_empty() {
            warn!(id = %article.id, "Article has no content in any field, skipping dedup");
            return Ok((
                DeduplicationDecision {
                    checked_at: now,
                    ..Default::default()
                },
                false,
            ));
        }

        if self.exact_match(article).await {
            return Ok((
                DeduplicationDecision {
                    is_duplicate: true,
                    is_exact_duplicate: true,
                    matching_id: Some(article.id.clone()),
                    checked_at: now,
                    ..Default::default()
                },
                true,
            ));
        }

        let candidates = self
            .index
            .query_similar(&content, self.config.max_candidates)
            .await?;

        let mut best: Option<(SimilarDocument, f32)> = None;
        for candidate in candidates {
            let similarity = 1.0 - candidate.distance;
            if similarity < self.config.similarity_threshold {
                continue;
            }

            let Some(reference) = reference_timestamp(&candidate.metadata) else {
                warn!(id = %candidate.id, "Candidate has no valid timestamp, evicting");
                self.evict(&candidate.id).await;
                continue;
            };
            if reference < now - self.config.ttl {
                info!(id = %candidate.id, reference = %reference, "Candidate expired, evicting");
                self.evict(&candidate.id).await;
                continue;
            }

            // Ties go to the earlier candidate.
            match &best {
                Some((_, best_similarity)) if similarity <= *best_similarity => {}
                _ => best = Some((candidate, similarity)),
            }
        }

        if let Some((matched, similarity)) = best {
            self.refresh_metadata(&matched, now).await;
            return Ok((
                DeduplicationDecision {
                    is_duplicate: true,
                    is_exact_duplicate: false,
                    matching_id: Some(matched.id),
                    similarity_score: similarity,
                    checked_at: now,
                },
                true,
            ));
        }

        Ok((
            DeduplicationDecision {
                checked_at: now,
                ..Default::default()
            },
            true,
        ))
    }

    /// Tier-1 membership check. Filter errors degrade to "not present" so
    /// vector similarity stays authoritative.
    async fn exact_match(&self, article: &Article) -> bool {
        if !article.url.is_empty() {
            match self.filter.exists(&article.url).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Exact-match URL check failed, assuming absent"),
            }
        }
        let title_key = normalize_title(&article.title);
        if !title_key.is_empty() {
            match self.filter.exists(&title_key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Exact-match title check failed, assuming absent"),
            }
        }
        false
    }

    async fn evict(&self, id: &str) {
        if let Err(e) = self.index.delete_document(id).await {
            warn!(id, error = %e, "Failed to evict document");
        }
    }

    /// Refresh the matched document's access timestamps. Best-effort: the
    /// duplicate decision stands even when the write fails.
    async fn refresh_metadata(&self, matched: &SimilarDocument, now: DateTime<Utc>) {
        let mut metadata = matched.metadata.clone();
        let stamp = now.to_rfc3339();
        metadata.insert("last_retrieved_at".to_string(), stamp.clone().into());
        metadata.insert("last_update".to_string(), stamp.into());
        if let Err(e) = self.index.update_document(&matched.id, metadata).await {
            warn!(id = %matched.id, error = %e, "Failed to refresh match metadata");
        }
    }
}

/// Metadata written alongside a newly stored article. Array values are
/// comma-joined; not every backend round-trips arrays.
pub fn document_metadata(article: &Article, now: DateTime<Utc>) -> Metadata {
    let stamp = now.to_rfc3339();
    let mut metadata = Metadata::new();
    metadata.insert("article_id".to_string(), article.id.clone().into());
    metadata.insert("title".to_string(), article.title.clone().into());
    metadata.insert("url".to_string(), article.url.clone().into());
    metadata.insert(
        "published_at".to_string(),
        article
            .published_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
            .into(),
    );
    metadata.insert(
        "fetched_at".to_string(),
        article
            .fetched_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
            .into(),
    );
    metadata.insert("author".to_string(), article.author.clone().into());
    metadata.insert("categories".to_string(), article.categories.join(",").into());
    metadata.insert("added_at".to_string(), stamp.clone().into());
    metadata.insert("last_retrieved_at".to_string(), stamp.clone().into());
    metadata.insert("last_update".to_string(), stamp.into());
    metadata
}

/// Resolve a stored document's reference timestamp: `last_update`, then
/// `last_retrieved_at`, then `added_at`; first value that parses as RFC3339.
pub fn reference_timestamp(metadata: &Metadata) -> Option<DateTime<Utc>> {
    for key in ["last_update", "last_retrieved_at", "added_at"] {
        if let Some(value) = metadata.get(key).and_then(|v| v.as_str()) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
                return Some(parsed.with_timezone(&Utc));
            }
        }
    }
    None
}
