//! Chunking policy and output types.

use thiserror::Error;

// ── Policy ──────────────────────────────────────────────────────────────────

/// Token ceilings of common embedding models. A policy naming one of these
/// uses the ceiling instead of its own `max_tokens`.
const MODEL_TOKEN_LIMITS: &[(&str, usize)] = &[
    ("text-embedding-ada-002", 8191),
    ("text-embedding-3-small", 8191),
    ("text-embedding-3-large", 8191),
    ("e5-large-v2", 512),
    ("e5-base-v2", 512),
    ("e5-small-v2", 512),
];

/// Known per-model token ceiling, if any.
pub fn model_token_limit(model: &str) -> Option<usize> {
    MODEL_TOKEN_LIMITS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, limit)| *limit)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("invalid chunking policy: {0}")]
    InvalidPolicy(String),
}

/// How a document is split. Supplied per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingPolicy {
    /// Maximum estimated tokens per chunk (default: 500).
    pub max_tokens: usize,
    /// Maximum estimated tokens repeated between adjacent chunks (default: 100).
    pub overlap_tokens: usize,
    /// Embedding model whose known ceiling overrides `max_tokens`.
    pub model_name: Option<String>,
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_tokens: 100,
            model_name: None,
        }
    }
}

impl ChunkingPolicy {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
            model_name: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    /// The ceiling chunks are packed against: the model's limit when the model
    /// is known, `max_tokens` otherwise.
    pub fn effective_max_tokens(&self) -> usize {
        self.model_name
            .as_deref()
            .and_then(model_token_limit)
            .unwrap_or(self.max_tokens)
    }

    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.max_tokens == 0 {
            return Err(ChunkingError::InvalidPolicy(
                "max_tokens must be positive".into(),
            ));
        }
        if self.overlap_tokens > self.max_tokens {
            return Err(ChunkingError::InvalidPolicy(format!(
                "overlap_tokens ({}) exceeds max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            )));
        }
        Ok(())
    }
}

// ── Chunk output ────────────────────────────────────────────────────────────

/// A contiguous span of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position within the document.
    pub index: usize,
    /// The chunk text content.
    pub content: String,
    /// Estimated tokens of `content`.
    pub tokens: usize,
    /// Byte length of the leading text repeated from the previous chunk
    /// (0 when the chunk starts fresh).
    pub overlap_len: usize,
    /// Estimated tokens of that repeated text.
    pub overlap_tokens: usize,
}

impl Chunk {
    /// The part of the chunk not repeated from its predecessor.
    pub fn fresh_content(&self) -> &str {
        self.content[self.overlap_len..].trim_start()
    }
}
