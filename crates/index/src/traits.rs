use async_trait::async_trait;

use crate::error::IndexError;
use crate::types::{CollectionInfo, Distance, Point, ScoredPoint};

/// Operations a vector index backend must provide (Qdrant, in-memory, ...).
///
/// Backends are thin: they do not check dimensions or collection state beyond
/// what the service itself reports. [`crate::Collection`] layers those checks
/// on top.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError>;

    /// Create a collection. Fails with [`IndexError::AlreadyExists`] when the
    /// name is taken.
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError>;

    /// Returns `None` when the collection does not exist.
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, IndexError>;

    /// Returns whether a collection was actually removed.
    async fn delete_collection(&self, name: &str) -> Result<bool, IndexError>;

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), IndexError>;

    /// Nearest neighbours of `vector`, best match first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError>;

    /// Remove every point whose payload `parent_id` equals `document_id`.
    async fn delete_by_document(&self, collection: &str, document_id: &str)
        -> Result<(), IndexError>;
}
