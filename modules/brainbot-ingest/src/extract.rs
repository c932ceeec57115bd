//! Full-content extraction for fetched articles.
//!
//! Runs up to `concurrency` HTTP GETs at a time, applies Readability
//! extraction, and records per-article failures on the article itself.
//! Output order matches input order; the pool drains before return.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use brainbot_common::Article;
use futures::{stream, StreamExt};
use regex::Regex;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_CONCURRENCY: usize = 5;

const EXCERPT_MAX_CHARS: usize = 200;

// --- PageFetcher trait ---

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain reqwest GET with a 30s deadline.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build page HTTP client");
        Self { client }
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", "brainbot-ingest/0.1")
            .send()
            .await
            .context("Page fetch failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Page fetch returned status {status}");
        }

        resp.text().await.context("Failed to read page body")
    }
}

// --- Extractor ---

pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    concurrency: usize,
    og_image: Regex,
    meta_author: Regex,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, concurrency: usize) -> Self {
        let concurrency = if concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            concurrency
        };
        let og_image = Regex::new(
            r#"<meta[^>]+property\s*=\s*["']og:image["'][^>]+content\s*=\s*["']([^"']+)["']"#,
        )
        .expect("Invalid og:image regex");
        let meta_author = Regex::new(
            r#"<meta[^>]+name\s*=\s*["']author["'][^>]+content\s*=\s*["']([^"']+)["']"#,
        )
        .expect("Invalid meta author regex");
        Self {
            fetcher,
            concurrency,
            og_image,
            meta_author,
        }
    }

    /// Extract full content for every article. Articles with no URL or a
    /// failing fetch/extract get `extraction_error` set and are carried
    /// forward unchanged otherwise.
    pub async fn extract_all(&self, articles: Vec<Article>) -> Vec<Article> {
        let total = articles.len();
        let mut extracted: Vec<(usize, Article)> = stream::iter(
            articles
                .into_iter()
                .enumerate()
                .map(|(i, article)| async move { (i, self.extract_one(article).await) }),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        // Completion order is unbounded; restore input order by index.
        extracted.sort_by_key(|(i, _)| *i);
        let articles: Vec<Article> = extracted.into_iter().map(|(_, a)| a).collect();

        let failures = articles
            .iter()
            .filter(|a| !a.extraction_error.is_empty())
            .count();
        info!(total, failures, "Content extraction complete");
        articles
    }

    async fn extract_one(&self, mut article: Article) -> Article {
        if article.url.is_empty() {
            article.extraction_error = "article has no URL".to_string();
            return article;
        }

        let html = match self.fetcher.fetch(&article.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %article.url, error = %e, "Page fetch failed");
                article.extraction_error = e.to_string();
                return article;
            }
        };

        let base = match Url::parse(&article.url) {
            Ok(u) => u,
            Err(e) => {
                article.extraction_error = format!("invalid article URL: {e}");
                return article;
            }
        };

        match readability::extractor::extract(&mut Cursor::new(html.as_bytes()), &base) {
            Ok(product) => {
                article.full_content_text = product.text.trim().to_string();
                article.full_content_html = product.content;
                article.excerpt = make_excerpt(&article.full_content_text);
            }
            Err(e) => {
                warn!(url = %article.url, error = %e, "Readability extraction failed");
                article.extraction_error = format!("readability: {e}");
                return article;
            }
        }

        if article.image_url.is_empty() {
            if let Some(cap) = self.og_image.captures(&html) {
                article.image_url = cap[1].to_string();
            }
        }
        if article.author.is_empty() {
            if let Some(cap) = self.meta_author.captures(&html) {
                article.author = cap[1].to_string();
            }
        }

        article
    }
}

/// First ~200 chars of the text, trimmed back to a word boundary, with an
/// ellipsis when truncated.
fn make_excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= EXCERPT_MAX_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_MAX_CHARS).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => &cut[..],
    };
    format!("{}…", trimmed.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFetcher {
        body: String,
        fail: bool,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.body.clone())
        }
    }

    fn page(body: &str) -> String {
        format!(
            r#"<html><head>
                 <title>Page</title>
                 <meta property="og:image" content="https://example.com/cover.jpg"/>
                 <meta name="author" content="Jane Writer"/>
               </head>
               <body><article><h1>Headline</h1>{body}</article></body></html>"#
        )
    }

    fn article(url: &str) -> Article {
        Article {
            id: "abcd1234abcd1234".into(),
            title: "Headline".into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn extraction_fills_content_and_fallbacks() {
        let body = "<p>Paragraph one with enough words to survive readability scoring. \
                    It keeps going for a while so the extractor has real content to keep.</p>\
                    <p>Paragraph two also contains a good amount of sentence material.</p>";
        let fetcher = Arc::new(StaticFetcher {
            body: page(body),
            fail: false,
        });
        let extractor = ContentExtractor::new(fetcher, 2);

        let out = extractor
            .extract_all(vec![article("https://example.com/story")])
            .await;

        assert_eq!(out.len(), 1);
        let a = &out[0];
        assert!(a.extraction_error.is_empty(), "unexpected error: {}", a.extraction_error);
        assert!(a.full_content_text.contains("Paragraph one"));
        assert!(!a.full_content_html.is_empty());
        assert!(!a.excerpt.is_empty());
        assert_eq!(a.image_url, "https://example.com/cover.jpg");
        assert_eq!(a.author, "Jane Writer");
    }

    #[tokio::test]
    async fn fetch_failure_is_recorded_not_dropped() {
        let fetcher = Arc::new(StaticFetcher {
            body: String::new(),
            fail: true,
        });
        let extractor = ContentExtractor::new(fetcher, 2);

        let out = extractor
            .extract_all(vec![
                article("https://example.com/one"),
                article("https://example.com/two"),
            ])
            .await;

        assert_eq!(out.len(), 2, "failing articles are still propagated");
        assert!(out.iter().all(|a| a.extraction_error.contains("connection refused")));
    }

    #[tokio::test]
    async fn output_order_matches_input_order() {
        let body = "<p>Stable body content for ordering test, long enough to extract \
                    without readability discarding the whole page outright.</p>";
        let fetcher = Arc::new(StaticFetcher {
            body: page(body),
            fail: false,
        });
        let extractor = ContentExtractor::new(fetcher, 3);

        let input: Vec<Article> = (0..10)
            .map(|i| article(&format!("https://example.com/item/{i}")))
            .collect();
        let urls: Vec<String> = input.iter().map(|a| a.url.clone()).collect();

        let out = extractor.extract_all(input).await;
        let out_urls: Vec<String> = out.iter().map(|a| a.url.clone()).collect();
        assert_eq!(urls, out_urls);
    }

    #[test]
    fn excerpt_respects_word_boundaries() {
        let text = "word ".repeat(100);
        let excerpt = make_excerpt(&text);
        assert!(excerpt.chars().count() <= EXCERPT_MAX_CHARS + 1);
        assert!(excerpt.ends_with('…'));
        assert!(!excerpt.contains("word wor…"), "no mid-word cut");

        assert_eq!(make_excerpt("short text"), "short text");
    }
}
