//! Collection lifecycle: make sure a named collection exists with the expected
//! vector dimension before any point is written or searched.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::IndexError;
use crate::traits::VectorIndex;
use crate::types::{Distance, Point, ScoredPoint};

/// What to do when an existing collection has the wrong vector dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Drop the collection and create it again. Every stored point is lost.
    Recreate,
    /// Refuse to use the collection until it is migrated by hand.
    Fail,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recreate" => Ok(MismatchPolicy::Recreate),
            "fail" => Ok(MismatchPolicy::Fail),
            other => Err(format!("unknown dimension mismatch policy: '{other}'")),
        }
    }
}

impl fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchPolicy::Recreate => write!(f, "recreate"),
            MismatchPolicy::Fail => write!(f, "fail"),
        }
    }
}

/// Handle to one named collection of a [`VectorIndex`].
///
/// The first upsert or search runs the lifecycle check (create if absent,
/// handle a dimension mismatch per [`MismatchPolicy`]) exactly once for this
/// handle. A failed check is not remembered, so the next call tries again.
/// Every vector is validated against the configured dimension before it
/// reaches the backend.
pub struct Collection {
    index: Arc<dyn VectorIndex>,
    name: String,
    dimensions: usize,
    distance: Distance,
    on_mismatch: MismatchPolicy,
    ready: OnceCell<()>,
}

impl Collection {
    pub fn new(index: Arc<dyn VectorIndex>, name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            index,
            name: name.into(),
            dimensions,
            distance: Distance::Cosine,
            on_mismatch: MismatchPolicy::Recreate,
            ready: OnceCell::new(),
        }
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.on_mismatch = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Run the lifecycle check once. Concurrent callers wait for the same
    /// initialization.
    pub async fn ensure_ready(&self) -> Result<(), IndexError> {
        self.ready
            .get_or_try_init(|| self.initialize())
            .await
            .map(|_| ())
    }

    async fn initialize(&self) -> Result<(), IndexError> {
        let existing = self.index.list_collections().await?;
        if !existing.iter().any(|n| n == &self.name) {
            self.create_if_absent().await?;
            info!(collection = %self.name, dimensions = self.dimensions, "created collection");
            return Ok(());
        }

        let Some(info) = self.index.get_collection(&self.name).await? else {
            // Dropped between list and get.
            return self.create_if_absent().await;
        };

        if info.dimensions == Some(self.dimensions) {
            info!(
                collection = %self.name,
                dimensions = self.dimensions,
                "collection already exists with correct vector size"
            );
            return Ok(());
        }

        let actual = info.dimensions.unwrap_or(0);
        match self.on_mismatch {
            MismatchPolicy::Fail => Err(IndexError::DimensionMismatch {
                collection: self.name.clone(),
                expected: self.dimensions,
                actual,
            }),
            MismatchPolicy::Recreate => {
                warn!(
                    collection = %self.name,
                    expected = self.dimensions,
                    actual,
                    points_lost = info.points_count.unwrap_or(0),
                    "vector size mismatch, dropping and recreating collection"
                );
                self.index.delete_collection(&self.name).await?;
                self.create_if_absent().await?;
                info!(
                    collection = %self.name,
                    dimensions = self.dimensions,
                    "recreated collection"
                );
                Ok(())
            }
        }
    }

    /// Create the collection, accepting one created concurrently by someone
    /// else as long as its dimension matches.
    async fn create_if_absent(&self) -> Result<(), IndexError> {
        match self
            .index
            .create_collection(&self.name, self.dimensions, self.distance)
            .await
        {
            Ok(()) => Ok(()),
            Err(IndexError::AlreadyExists(_)) => {
                let info = self.index.get_collection(&self.name).await?.ok_or_else(|| {
                    IndexError::Lifecycle {
                        collection: self.name.clone(),
                        reason: "reported as existing but not found".into(),
                    }
                })?;
                match info.dimensions {
                    Some(d) if d == self.dimensions => Ok(()),
                    other => Err(IndexError::DimensionMismatch {
                        collection: self.name.clone(),
                        expected: self.dimensions,
                        actual: other.unwrap_or(0),
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                collection: self.name.clone(),
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    pub async fn upsert(&self, point: Point) -> Result<(), IndexError> {
        self.check_dimensions(&point.vector)?;
        self.ensure_ready().await?;
        self.index.upsert(&self.name, vec![point]).await
    }

    /// Nearest neighbours in index order. The query vector's dimension is
    /// checked before any request is made.
    pub async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, IndexError> {
        self.check_dimensions(vector)?;
        self.ensure_ready().await?;
        self.index.search(&self.name, vector, k).await
    }

    /// Remove every chunk that belongs to `document_id`.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), IndexError> {
        self.ensure_ready().await?;
        self.index.delete_by_document(&self.name, document_id).await
    }
}
