use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("embedding request timed out: {0}")]
    Timeout(String),

    #[error("embedding provider rate limit hit: {0}")]
    RateLimited(String),

    #[error("API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("embedding provider returned no vectors")]
    EmptyResult,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Timeout(err.to_string())
        } else {
            EmbeddingError::Http(err)
        }
    }
}

impl EmbeddingError {
    /// Map a non-success HTTP status to the matching error.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if status == 429 {
            EmbeddingError::RateLimited(body)
        } else {
            EmbeddingError::Api { status, body }
        }
    }
}

/// Validate a provider response: one vector per input, each of `dimensions`.
pub(crate) fn check_vectors(
    vectors: &[Vec<f32>],
    inputs: usize,
    dimensions: usize,
) -> Result<(), EmbeddingError> {
    if vectors.len() < inputs {
        return Err(EmbeddingError::EmptyResult);
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimensions,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Trait for embedding backends (OpenAI, Ollama, ...)
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input text (in order).
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The dimensionality of the output vectors.
    fn dimensions(&self) -> usize;

    /// Embed a single text in one provider round trip.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyEmbedder;

    #[async_trait]
    impl Embedder for EmptyEmbedder {
        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(Vec::new())
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn empty_batch_is_distinct_from_failure() {
        let err = EmptyEmbedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyResult));
    }

    #[test]
    fn short_or_wrong_sized_responses_are_rejected() {
        assert!(matches!(
            check_vectors(&[], 1, 3),
            Err(EmbeddingError::EmptyResult)
        ));
        assert!(matches!(
            check_vectors(&[vec![0.0; 768]], 1, 1536),
            Err(EmbeddingError::DimensionMismatch {
                expected: 1536,
                actual: 768
            })
        ));
        assert!(check_vectors(&[vec![0.0; 3], vec![1.0; 3]], 2, 3).is_ok());
    }

    #[test]
    fn status_429_is_rate_limit() {
        assert!(matches!(
            EmbeddingError::from_status(429, "slow down".into()),
            EmbeddingError::RateLimited(_)
        ));
        assert!(matches!(
            EmbeddingError::from_status(400, "bad input".into()),
            EmbeddingError::Api { status: 400, .. }
        ));
    }
}
