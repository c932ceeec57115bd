use std::env;

/// Application configuration loaded from environment variables.
///
/// Each service loads only the slice it needs via its own constructor;
/// unused fields stay at their defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    // Chroma vector store
    pub chroma_host: String,
    pub chroma_port: u16,
    pub chroma_collection: String,
    /// Optional embedding model override for the selected provider.
    pub embedding_model: String,

    // Embedding providers (selection: Cohere first, then OpenAI)
    pub cohere_api_key: String,
    pub openai_api_key: String,
    pub openai_org_id: String,

    // Redis / RedisBloom exact-match filter
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
    pub bloom_key: String,
    /// Sliding TTL refreshed on every add. 0 = no expiry.
    pub bloom_ttl_seconds: u64,
    pub bloom_capacity: u64,
    pub bloom_error_rate: f64,
    pub bloom_nonscaling: bool,

    // S3 object store. Uploads are disabled when bucket is empty.
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
    pub s3_profile: String,
    pub s3_endpoint: String,
    pub s3_use_path_style: bool,
    pub presign_ttl_seconds: u64,

    // Deduplication overrides. 0 = use built-in default.
    pub similarity_threshold: f32,
    pub max_candidates: usize,

    // HTTP
    pub http_port: u16,

    // Orchestrator
    pub ingest_api_url: String,
    pub generation_service_url: String,
    pub cron_schedule: String,
    pub bus_brokers: String,
    pub bus_port: u16,
    pub bus_topic: String,
    pub bus_group_id: String,
}

impl Config {
    /// Load config for the ingestion service.
    pub fn ingest_from_env() -> Self {
        Self {
            chroma_host: env_or("CHROMA_HOST", "localhost"),
            chroma_port: parsed_env("CHROMA_PORT", 8000),
            chroma_collection: env_or("CHROMA_COLLECTION", "brainbot_articles"),
            embedding_model: env::var("EMBEDDING_MODEL").unwrap_or_default(),
            cohere_api_key: env::var("COHERE_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_org_id: env::var("OPENAI_ORG_ID").unwrap_or_default(),
            redis_addr: env_or("REDIS_ADDR", "localhost:6379"),
            redis_password: env::var("REDIS_PASSWORD").unwrap_or_default(),
            redis_db: parsed_env("REDIS_DB", 0),
            bloom_key: env_or("BLOOM_KEY", "brainbot:seen"),
            bloom_ttl_seconds: parsed_env("BLOOM_TTL_SECONDS", 0),
            bloom_capacity: parsed_env("BLOOM_CAPACITY", 100_000),
            bloom_error_rate: parsed_env("BLOOM_ERROR_RATE", 0.001),
            bloom_nonscaling: bool_env("BLOOM_NONSCALING"),
            s3_bucket: env::var("S3_BUCKET").unwrap_or_default(),
            s3_prefix: env_or("S3_PREFIX", "articles/"),
            s3_region: env::var("AWS_REGION").unwrap_or_default(),
            s3_profile: env::var("AWS_PROFILE").unwrap_or_default(),
            s3_endpoint: env::var("S3_ENDPOINT").unwrap_or_default(),
            s3_use_path_style: bool_env("S3_USE_PATH_STYLE"),
            presign_ttl_seconds: parsed_env("PRESIGN_TTL_SECONDS", 900),
            similarity_threshold: parsed_env("SIMILARITY_THRESHOLD", 0.0),
            max_candidates: parsed_env("MAX_CANDIDATES", 0),
            http_port: parsed_env("HTTP_PORT", 8080),
            ..Default::default()
        }
    }

    /// Load config for the orchestrator service.
    pub fn orchestrator_from_env() -> Self {
        let bus_port: u16 = parsed_env("BUS_PORT", 9092);
        Self {
            ingest_api_url: env_or("INGEST_API_URL", "http://localhost:8080"),
            generation_service_url: env_or(
                "GENERATION_SERVICE_URL",
                "http://localhost:8090",
            ),
            cron_schedule: env_or("CRON_SCHEDULE", "0 */5 * * * *"),
            http_port: parsed_env("HTTP_PORT", 8081),
            bus_brokers: env_or("BUS_BROKERS", &format!("localhost:{bus_port}")),
            bus_port,
            bus_topic: env_or("BUS_TOPIC", "brainbot.generation.complete"),
            bus_group_id: env_or("BUS_GROUP_ID", "brainbot-orchestrator"),
            ..Default::default()
        }
    }

    /// Log the loaded configuration without exposing secret values.
    pub fn log_redacted(&self) {
        let secrets = [
            ("COHERE_API_KEY", &self.cohere_api_key),
            ("OPENAI_API_KEY", &self.openai_api_key),
            ("REDIS_PASSWORD", &self.redis_password),
        ];
        for (name, value) in secrets {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
        tracing::info!(
            chroma = %format!("{}:{}", self.chroma_host, self.chroma_port),
            collection = %self.chroma_collection,
            redis = %self.redis_addr,
            bucket = %self.s3_bucket,
            ingest_api = %self.ingest_api_url,
            brokers = %self.bus_brokers,
            "Configuration loaded"
        );
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn bool_env(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
