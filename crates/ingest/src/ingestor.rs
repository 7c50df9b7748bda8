//! Document ingestion: chunk, size-guard, embed, and upsert each chunk.
//!
//! Chunk failures are soft. A chunk that is too large or whose embedding or
//! upsert fails is reported in [`IngestReport::skipped`] and its siblings
//! carry on. Only an invalid policy or an unusable collection fails the call.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use quarry_core::{payload_keys, Metadata};
use quarry_index::{Collection, IndexError, Point};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunker::{split_with, Chunk, ChunkingError, ChunkingPolicy, TokenEstimator};
use crate::embedding::Embedder;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    #[error("collection unavailable: {0}")]
    Collection(#[from] IndexError),
}

/// Ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub policy: ChunkingPolicy,
    /// Hard input ceiling of the embedding provider, in estimated tokens.
    pub token_ceiling: usize,
    /// Chunks embedded and upserted at the same time.
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            policy: ChunkingPolicy::new(1000, 100),
            token_ceiling: 8000,
            concurrency: 4,
        }
    }
}

/// Why a chunk was not indexed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    TooLarge { tokens: usize, ceiling: usize },
    Embedding { message: String },
    Upsert { message: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooLarge { tokens, ceiling } => {
                write!(f, "chunk has {tokens} tokens, provider ceiling is {ceiling}")
            }
            SkipReason::Embedding { message } => write!(f, "embedding failed: {message}"),
            SkipReason::Upsert { message } => write!(f, "upsert failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedChunkRef {
    pub chunk_index: usize,
    pub point_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedChunk {
    pub chunk_index: usize,
    pub reason: SkipReason,
}

/// Outcome of one [`Ingestor::ingest`] call, both lists in chunk order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub total_chunks: usize,
    pub indexed: Vec<IndexedChunkRef>,
    pub skipped: Vec<SkippedChunk>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    collection: Arc<Collection>,
    estimator: Arc<dyn TokenEstimator>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        collection: Arc<Collection>,
        estimator: Arc<dyn TokenEstimator>,
        config: IngestConfig,
    ) -> Self {
        Self {
            embedder,
            collection,
            estimator,
            config,
        }
    }

    /// Chunk `content` and index every chunk under `document_id`.
    pub async fn ingest(
        &self,
        document_id: &str,
        content: &str,
        metadata: Metadata,
    ) -> Result<IngestReport, IngestError> {
        let chunks = split_with(content, &self.config.policy, self.estimator.as_ref())?;
        let total_chunks = chunks.len();
        info!(
            document_id,
            total_chunks,
            chars = content.len(),
            "ingesting document"
        );

        self.collection.ensure_ready().await?;

        let outcomes: Vec<(usize, Result<String, SkipReason>)> = stream::iter(chunks)
            .map(|chunk| {
                let payload = chunk_payload(&metadata, document_id, &chunk, total_chunks);
                async move {
                    let index = chunk.index;
                    (index, self.index_chunk(chunk, payload).await)
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = IngestReport {
            document_id: document_id.to_string(),
            total_chunks,
            indexed: Vec::new(),
            skipped: Vec::new(),
        };
        for (chunk_index, outcome) in outcomes {
            match outcome {
                Ok(point_id) => report.indexed.push(IndexedChunkRef {
                    chunk_index,
                    point_id,
                }),
                Err(reason) => {
                    warn!(document_id, chunk_index, %reason, "skipped chunk");
                    report.skipped.push(SkippedChunk {
                        chunk_index,
                        reason,
                    });
                }
            }
        }

        info!(
            document_id,
            indexed = report.indexed.len(),
            skipped = report.skipped.len(),
            "document ingested"
        );
        Ok(report)
    }

    async fn index_chunk(&self, chunk: Chunk, payload: Metadata) -> Result<String, SkipReason> {
        let tokens = self.estimator.estimate(&chunk.content);
        if tokens > self.config.token_ceiling {
            return Err(SkipReason::TooLarge {
                tokens,
                ceiling: self.config.token_ceiling,
            });
        }

        let vector = self
            .embedder
            .embed(&chunk.content)
            .await
            .map_err(|e| SkipReason::Embedding {
                message: e.to_string(),
            })?;

        let point_id = Uuid::new_v4().to_string();
        self.collection
            .upsert(Point {
                id: point_id.clone(),
                vector,
                payload,
            })
            .await
            .map_err(|e| SkipReason::Upsert {
                message: e.to_string(),
            })?;

        debug!(chunk_index = chunk.index, %point_id, tokens, "chunk indexed");
        Ok(point_id)
    }
}

/// Caller metadata overlaid with the chunk's own keys; chunk keys win.
fn chunk_payload(metadata: &Metadata, document_id: &str, chunk: &Chunk, total: usize) -> Metadata {
    let mut payload = metadata.clone();
    payload.insert(
        payload_keys::CONTENT.to_string(),
        Value::String(chunk.content.clone()),
    );
    payload.insert(
        payload_keys::PARENT_ID.to_string(),
        Value::String(document_id.to_string()),
    );
    payload.insert(payload_keys::CHUNK_INDEX.to_string(), chunk.index.into());
    payload.insert(payload_keys::TOTAL_CHUNKS.to_string(), total.into());
    payload
}
