use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Articles ---

/// One RSS item plus optionally-extracted full content.
///
/// Created by the feed reader with extraction fields empty; the content
/// extractor fills `full_content_html`, `full_content_text`, `excerpt` and
/// may backfill `image_url`/`author`. Extraction failures are recorded on
/// the article itself (`extraction_error`), never dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Article {
    /// 16-hex-char stable identifier (see `stable_id`).
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub full_content_html: String,
    #[serde(default)]
    pub full_content_text: String,
    #[serde(default)]
    pub excerpt: String,
    /// Non-empty iff content extraction failed for this article.
    #[serde(default)]
    pub extraction_error: String,
}

impl Article {
    /// Best available body text, in preference order. Empty when the
    /// article carries no usable content at all.
    pub fn best_content(&self) -> &str {
        if !self.full_content_text.is_empty() {
            &self.full_content_text
        } else if !self.full_content_html.is_empty() {
            &self.full_content_html
        } else if !self.summary.is_empty() {
            &self.summary
        } else {
            &self.title
        }
    }
}

/// Outcome of a per-article duplicate check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeduplicationDecision {
    pub is_duplicate: bool,
    #[serde(default)]
    pub is_exact_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_id: Option<String>,
    /// Cosine similarity to the matched document, in [0, 1]. Zero when no
    /// vector comparison took place (non-duplicates and exact matches).
    #[serde(default)]
    pub similarity_score: f32,
    pub checked_at: DateTime<Utc>,
}

// --- Workflow completion ---

/// Asynchronous completion message from the generation service, keyed by
/// the UUID the workflow runner issued. Timestamp payloads are opaque
/// pass-through for the downstream renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub uuid: String,
    #[serde(default)]
    pub voiceover: String,
    #[serde(default)]
    pub subtitle_timestamps: Vec<serde_json::Value>,
    #[serde(default)]
    pub resource_timestamps: serde_json::Map<String, serde_json::Value>,
    /// Opaque status string; "success" and "failure" are both terminal.
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<HashMap<String, f64>>,
}

impl WebhookPayload {
    /// A payload is acceptable iff it names the workflow it completes.
    pub fn is_valid(&self) -> bool {
        !self.uuid.is_empty()
    }
}

// --- Feed presets ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPreset {
    pub name: String,
    pub url: String,
}

/// Built-in feed presets keyed by short opaque tags.
pub fn feed_presets() -> HashMap<&'static str, FeedPreset> {
    let table = [
        ("ap", "Associated Press", "https://feeds.apnews.com/rss/apf-topnews"),
        ("bb", "BBC News", "https://feeds.bbci.co.uk/news/rss.xml"),
        ("np", "NPR News", "https://feeds.npr.org/1001/rss.xml"),
        ("ny", "New York Times", "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml"),
        ("gd", "The Guardian", "https://www.theguardian.com/us-news/rss"),
        ("aj", "Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
    ];
    table
        .into_iter()
        .map(|(key, name, url)| {
            (
                key,
                FeedPreset {
                    name: name.to_string(),
                    url: url.to_string(),
                },
            )
        })
        .collect()
}

/// Resolve a preset key to its feed URL. Unknown keys are treated as
/// literal URLs so callers can pass arbitrary feeds through the same door.
pub fn resolve_feed_url(key: &str) -> String {
    feed_presets()
        .get(key)
        .map(|p| p.url.clone())
        .unwrap_or_else(|| key.to_string())
}
