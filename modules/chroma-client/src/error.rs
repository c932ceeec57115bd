use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChromaError>;

#[derive(Debug, Error)]
pub enum ChromaError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ChromaError {
    fn from(err: reqwest::Error) -> Self {
        ChromaError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ChromaError {
    fn from(err: serde_json::Error) -> Self {
        ChromaError::Parse(err.to_string())
    }
}
