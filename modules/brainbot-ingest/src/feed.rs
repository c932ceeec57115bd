//! RSS/Atom feed reader. Parses a feed into normalized `Article`s with
//! extraction fields left empty.

use std::time::Duration;

use brainbot_common::{stable_id, Article, BrainbotError};
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use tracing::info;

pub struct FeedReader {
    client: reqwest::Client,
}

impl FeedReader {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build feed HTTP client");
        Self { client }
    }

    /// Fetch and parse a feed, returning at most `max_items` articles,
    /// newest first. Individual missing fields are not errors; a feed that
    /// fails to fetch or parse is.
    pub async fn fetch(
        &self,
        feed_url: &str,
        max_items: usize,
    ) -> Result<Vec<Article>, BrainbotError> {
        let resp = self
            .client
            .get(feed_url)
            .header("User-Agent", "brainbot-ingest/0.1")
            .send()
            .await
            .map_err(|e| BrainbotError::FeedFetch(format!("{feed_url}: {e}")))?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BrainbotError::FeedFetch(format!("{feed_url}: {e}")))?;

        let feed = feed_rs::parser::parse(&bytes[..])
            .map_err(|e| BrainbotError::FeedFetch(format!("{feed_url}: {e}")))?;

        let now = Utc::now();
        let mut articles: Vec<Article> = feed
            .entries
            .into_iter()
            .map(|entry| article_from_entry(entry, now))
            .collect();

        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles.truncate(max_items);

        info!(feed_url, items = articles.len(), "feed: parsed successfully");
        Ok(articles)
    }
}

impl Default for FeedReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize one feed entry into an `Article`.
///
/// ID source priority: link, then guid, then title. Publication time falls
/// back from published to updated; summary falls back to the content body.
fn article_from_entry(entry: Entry, now: DateTime<Utc>) -> Article {
    let url = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let guid = entry.id.clone();
    let title = entry.title.map(|t| t.content).unwrap_or_default();

    let id_source = if !url.is_empty() {
        &url
    } else if !guid.is_empty() {
        &guid
    } else {
        &title
    };
    let id = stable_id(id_source);

    let summary = entry
        .summary
        .map(|s| s.content)
        .filter(|s| !s.is_empty())
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc));

    let author = entry
        .authors
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();

    let categories = entry.categories.into_iter().map(|c| c.term).collect();

    let image_url = entry
        .media
        .first()
        .and_then(|m| {
            m.content
                .iter()
                .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
                .or_else(|| m.thumbnails.first().map(|t| t.image.uri.clone()))
        })
        .unwrap_or_default();

    Article {
        id,
        title,
        url,
        summary,
        author,
        categories,
        image_url,
        published_at,
        fetched_at: Some(now),
        ..Default::default()
    }
}
