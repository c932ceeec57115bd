use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrainbotError {
    #[error("Feed fetch error: {0}")]
    FeedFetch(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding count mismatch: sent {sent} texts, got {received} vectors")]
    EmbeddingCountMismatch { sent: usize, received: usize },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Exact-match filter error: {0}")]
    ExactMatch(String),

    #[error("Store write error: {0}")]
    StoreWrite(String),

    #[error("Presign error: {0}")]
    Presign(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Workflow conflict: a cycle is already active")]
    StateConflict,

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
