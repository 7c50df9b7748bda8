//! Query-time similarity search.

use std::sync::Arc;

use quarry_core::RetrievedPassage;
use quarry_index::{Collection, IndexError};
use quarry_ingest::embedding::{Embedder, EmbeddingError};
use thiserror::Error;
use tracing::{debug, info};

use crate::query::{extract_key_terms, normalize_query};

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("query is empty after normalization")]
    EmptyQuery,

    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Embeds a query and searches one collection for its nearest passages.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    collection: Arc<Collection>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, collection: Arc<Collection>) -> Self {
        Self {
            embedder,
            collection,
        }
    }

    /// Up to `k` passages in the order the index ranked them.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrieveError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(RetrieveError::EmptyQuery);
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let key_terms = extract_key_terms(&normalized);
        debug!(query = %normalized, ?key_terms, "processed query");

        let vector = self.embedder.embed(&normalized).await?;
        let hits = self.collection.search(&vector, k).await?;

        info!(k, hits = hits.len(), collection = self.collection.name(), "retrieved passages");
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedPassage::from_payload(hit.payload, hit.score))
            .collect())
    }
}
