use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use brainbot_common::Config;
use brainbot_ingest::dedup::{DedupConfig, Deduplicator};
use brainbot_ingest::extract::{ContentExtractor, HttpPageFetcher, DEFAULT_CONCURRENCY};
use brainbot_ingest::feed::FeedReader;
use brainbot_ingest::filter::{AbsentFilter, BloomFilter, ExactMatchFilter};
use brainbot_ingest::index::{ChromaStore, VectorStore};
use brainbot_ingest::routes::{router, AppState};
use brainbot_ingest::store::ArticleStore;
use embed_client::{CohereEmbedder, EmbeddingProvider, OpenAiEmbedder};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("brainbot=info".parse()?))
        .init();

    info!("Brainbot ingestion service starting...");

    let config = Config::ingest_from_env();
    config.log_redacted();

    // Embedding provider selection: Cohere key first, then OpenAI. With
    // neither, the vector store comes up read-only (count/list/clear work;
    // dedup endpoints report vector store errors).
    let embedder: Option<Arc<dyn EmbeddingProvider>> = if !config.cohere_api_key.is_empty() {
        Some(Arc::new(
            CohereEmbedder::new(&config.cohere_api_key).with_model(&config.embedding_model),
        ))
    } else if !config.openai_api_key.is_empty() {
        Some(Arc::new(
            OpenAiEmbedder::new(&config.openai_api_key, &config.openai_org_id)
                .with_model(&config.embedding_model),
        ))
    } else {
        warn!("No embedding API key configured, vector store is read-only");
        None
    };

    let index: Arc<dyn VectorStore> = match embedder {
        Some(embedder) => Arc::new(ChromaStore::new(
            &config.chroma_host,
            config.chroma_port,
            &config.chroma_collection,
            embedder,
        )),
        None => Arc::new(ChromaStore::read_only(
            &config.chroma_host,
            config.chroma_port,
            &config.chroma_collection,
        )),
    };

    let filter: Arc<dyn ExactMatchFilter> = match BloomFilter::connect(&config).await {
        Ok(filter) => Arc::new(filter),
        Err(e) => {
            warn!(error = %e, "Exact-match filter unavailable, degrading to vector-only dedup");
            Arc::new(AbsentFilter)
        }
    };

    let store = ArticleStore::connect(&config).await;

    let dedup = Deduplicator::new(
        Arc::clone(&index),
        Arc::clone(&filter),
        DedupConfig::from_config(&config),
    );

    let state = Arc::new(AppState {
        feed_reader: FeedReader::new(),
        extractor: ContentExtractor::new(Arc::new(HttpPageFetcher::new()), DEFAULT_CONCURRENCY),
        dedup,
        index,
        filter,
        store,
    });

    let app = router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    info!(addr = %addr, "Ingestion API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Ingestion service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
