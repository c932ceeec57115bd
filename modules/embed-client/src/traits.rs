use async_trait::async_trait;
use brainbot_common::BrainbotError;

/// Text → vector adapter over an external embedding API.
///
/// Implementations must return exactly one vector per input text, in input
/// order, and must not touch the network for empty input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, BrainbotError>;

    fn model_name(&self) -> &str;
}

/// Shared arity check: the provider must answer with one vector per text.
pub(crate) fn check_arity(sent: usize, received: usize) -> Result<(), BrainbotError> {
    if sent != received {
        return Err(BrainbotError::EmbeddingCountMismatch { sent, received });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_arity_is_an_error() {
        assert!(check_arity(3, 3).is_ok());
        let err = check_arity(3, 2).unwrap_err();
        assert!(matches!(
            err,
            BrainbotError::EmbeddingCountMismatch { sent: 3, received: 2 }
        ));
    }
}
