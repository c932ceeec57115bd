//! Content-addressed object store for article text.
//!
//! One object per deduplication group at `{prefix}{article_id}`. New
//! objects are written as `title\ncontent`; near-duplicates append
//! `\n--\n<content>` to the existing body. The separator is part of the
//! on-disk contract. Read-modify-write is not atomic; the sequential
//! per-cycle pipeline serializes appends per id.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use brainbot_common::{BrainbotError, Config};
use tracing::{debug, info};

pub struct ArticleStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    presign_ttl: Duration,
}

impl ArticleStore {
    /// Build the store from configuration. Returns `None` (uploads
    /// disabled) when no bucket is configured.
    pub async fn connect(config: &Config) -> Option<Self> {
        if config.s3_bucket.is_empty() {
            info!("No S3 bucket configured, object storage disabled");
            return None;
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !config.s3_profile.is_empty() {
            loader = loader.profile_name(&config.s3_profile);
        }
        if !config.s3_region.is_empty() {
            loader = loader.region(aws_config::Region::new(config.s3_region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.s3_use_path_style);
        if !config.s3_endpoint.is_empty() {
            builder = builder.endpoint_url(&config.s3_endpoint);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());

        Some(Self {
            client,
            bucket: config.s3_bucket.clone(),
            prefix: config.s3_prefix.clone(),
            presign_ttl: Duration::from_secs(config.presign_ttl_seconds),
        })
    }

    fn key(&self, article_id: &str) -> String {
        format!("{}{}", self.prefix, article_id)
    }

    /// Unconditionally write a new object as `title\ncontent`.
    pub async fn create(
        &self,
        article_id: &str,
        title: &str,
        content: &str,
    ) -> Result<(), BrainbotError> {
        let key = self.key(article_id);
        let body = initial_body(title, content);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("text/plain; charset=utf-8")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|e| BrainbotError::StoreWrite(e.to_string()))?;
        debug!(key = %key, "Stored article object");
        Ok(())
    }

    /// Append new content to an existing object behind the `\n--\n`
    /// separator.
    pub async fn append(&self, article_id: &str, content: &str) -> Result<(), BrainbotError> {
        let key = self.key(article_id);
        let existing = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| BrainbotError::StoreWrite(e.to_string()))?;
        let bytes = existing
            .body
            .collect()
            .await
            .map_err(|e| BrainbotError::StoreWrite(e.to_string()))?
            .into_bytes();
        let old_body = String::from_utf8_lossy(&bytes);

        let body = appended_body(&old_body, content);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("text/plain; charset=utf-8")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|e| BrainbotError::StoreWrite(e.to_string()))?;
        debug!(key = %key, "Appended to article object");
        Ok(())
    }

    /// Time-bounded GET URL for a stored object.
    pub async fn presigned_url(&self, article_id: &str) -> Result<String, BrainbotError> {
        let presigning = PresigningConfig::expires_in(self.presign_ttl)
            .map_err(|e| BrainbotError::Presign(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(article_id))
            .presigned(presigning)
            .await
            .map_err(|e| BrainbotError::Presign(e.to_string()))?;
        Ok(request.uri().to_string())
    }
}

fn initial_body(title: &str, content: &str) -> String {
    format!("{title}\n{content}")
}

fn appended_body(old_body: &str, new_content: &str) -> String {
    format!("{old_body}\n--\n{new_content}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_objects_start_with_the_title_line() {
        assert_eq!(initial_body("Hello World", "xxx"), "Hello World\nxxx");
    }

    #[test]
    fn appends_stack_behind_the_group_separator() {
        let first = initial_body("Hello World", "xxx");
        let second = appended_body(&first, "xxx extra");
        assert_eq!(second, "Hello World\nxxx\n--\nxxx extra");

        let third = appended_body(&second, "more");
        assert!(third.ends_with("\n--\nmore"));
        assert_eq!(third.matches("\n--\n").count(), 2);
    }
}
