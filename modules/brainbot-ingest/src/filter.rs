//! Probabilistic exact-match filter keyed on raw URL and normalized title.
//!
//! Backed by a RedisBloom scalable filter. False positives are bounded by
//! the configured error rate; false negatives do not occur. When Redis is
//! unreachable the deduplicator treats every key as absent and vector
//! similarity remains authoritative.

use async_trait::async_trait;
use brainbot_common::{BrainbotError, Config};
use redis::aio::MultiplexedConnection;
use tracing::{info, warn};

#[async_trait]
pub trait ExactMatchFilter: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, BrainbotError>;

    async fn add(&self, key: &str) -> Result<(), BrainbotError>;

    /// Drop the whole filter and re-reserve it.
    async fn clear(&self) -> Result<(), BrainbotError>;

    async fn ping(&self) -> Result<(), BrainbotError>;
}

#[derive(Clone)]
pub struct BloomSettings {
    pub key: String,
    pub capacity: u64,
    pub error_rate: f64,
    /// Sliding TTL refreshed on every add; 0 = no expiry.
    pub ttl_seconds: u64,
    pub nonscaling: bool,
}

impl BloomSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            key: config.bloom_key.clone(),
            capacity: config.bloom_capacity,
            error_rate: config.bloom_error_rate,
            ttl_seconds: config.bloom_ttl_seconds,
            nonscaling: config.bloom_nonscaling,
        }
    }
}

/// RedisBloom-backed filter holding one long-lived multiplexed connection.
pub struct BloomFilter {
    conn: MultiplexedConnection,
    settings: BloomSettings,
}

impl BloomFilter {
    /// Connect and reserve the filter if it does not already exist.
    pub async fn connect(config: &Config) -> Result<Self, BrainbotError> {
        let url = if config.redis_password.is_empty() {
            format!("redis://{}/{}", config.redis_addr, config.redis_db)
        } else {
            format!(
                "redis://:{}@{}/{}",
                config.redis_password, config.redis_addr, config.redis_db
            )
        };
        let client = redis::Client::open(url)
            .map_err(|e| BrainbotError::ExactMatch(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrainbotError::ExactMatch(e.to_string()))?;

        let filter = Self {
            conn,
            settings: BloomSettings::from_config(config),
        };
        filter.reserve().await?;
        Ok(filter)
    }

    async fn reserve(&self) -> Result<(), BrainbotError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("BF.RESERVE");
        cmd.arg(&self.settings.key)
            .arg(self.settings.error_rate)
            .arg(self.settings.capacity);
        if self.settings.nonscaling {
            cmd.arg("NONSCALING");
        }
        let reserved: redis::RedisResult<()> = cmd.query_async(&mut conn).await;
        match reserved {
            Ok(()) => {
                info!(
                    key = %self.settings.key,
                    capacity = self.settings.capacity,
                    error_rate = self.settings.error_rate,
                    "Reserved bloom filter"
                );
                Ok(())
            }
            // An existing filter is fine; anything else is a real failure.
            Err(e) if e.to_string().contains("exists") => Ok(()),
            Err(e) => Err(BrainbotError::ExactMatch(e.to_string())),
        }
    }
}

#[async_trait]
impl ExactMatchFilter for BloomFilter {
    async fn exists(&self, key: &str) -> Result<bool, BrainbotError> {
        let mut conn = self.conn.clone();
        let found: i64 = redis::cmd("BF.EXISTS")
            .arg(&self.settings.key)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| BrainbotError::ExactMatch(e.to_string()))?;
        Ok(found == 1)
    }

    async fn add(&self, key: &str) -> Result<(), BrainbotError> {
        let mut conn = self.conn.clone();
        let _added: i64 = redis::cmd("BF.ADD")
            .arg(&self.settings.key)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| BrainbotError::ExactMatch(e.to_string()))?;

        if self.settings.ttl_seconds > 0 {
            let expired: redis::RedisResult<i64> = redis::cmd("EXPIRE")
                .arg(&self.settings.key)
                .arg(self.settings.ttl_seconds)
                .query_async(&mut conn)
                .await;
            if let Err(e) = expired {
                warn!(error = %e, "Failed to refresh bloom filter TTL");
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), BrainbotError> {
        let mut conn = self.conn.clone();
        let _dropped: i64 = redis::cmd("DEL")
            .arg(&self.settings.key)
            .query_async(&mut conn)
            .await
            .map_err(|e| BrainbotError::ExactMatch(e.to_string()))?;
        self.reserve().await
    }

    async fn ping(&self) -> Result<(), BrainbotError> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| BrainbotError::ExactMatch(e.to_string()))?;
        Ok(())
    }
}

/// Stand-in used when Redis is unavailable at startup: reports every key as
/// absent and drops adds, leaving vector similarity authoritative.
pub struct AbsentFilter;

#[async_trait]
impl ExactMatchFilter for AbsentFilter {
    async fn exists(&self, _key: &str) -> Result<bool, BrainbotError> {
        Ok(false)
    }

    async fn add(&self, _key: &str) -> Result<(), BrainbotError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), BrainbotError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrainbotError> {
        Err(BrainbotError::ExactMatch(
            "exact-match filter disabled (no Redis connection)".to_string(),
        ))
    }
}
