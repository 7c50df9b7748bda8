use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use quarry_core::payload_keys;

use crate::error::IndexError;
use crate::traits::VectorIndex;
use crate::types::{CollectionInfo, Distance, Point, ScoredPoint};

struct MemoryCollection {
    dimensions: usize,
    distance: Distance,
    points: BTreeMap<String, Point>,
}

/// Process-local vector index with exact (brute-force) search.
///
/// Mirrors the service behaviour the pipeline relies on: conflicts on create,
/// dimension validation on upsert, best-first search results.
#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection, `None` if it does not exist.
    pub async fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    match distance {
        Distance::Cosine => cosine_similarity(a, b),
        Distance::Dot => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
        // Negated so that higher still means closer.
        Distance::Euclid => -a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(IndexError::AlreadyExists(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                dimensions,
                distance,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, IndexError> {
        Ok(self.collections.read().await.get(name).map(|c| CollectionInfo {
            name: name.to_string(),
            dimensions: Some(c.dimensions),
            distance: Some(c.distance),
            points_count: Some(c.points.len() as u64),
        }))
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, IndexError> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != target.dimensions) {
            return Err(IndexError::DimensionMismatch {
                collection: collection.to_string(),
                expected: target.dimensions,
                actual: bad.vector.len(),
            });
        }
        for point in points {
            target.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;
        if vector.len() != target.dimensions {
            return Err(IndexError::DimensionMismatch {
                collection: collection.to_string(),
                expected: target.dimensions,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<ScoredPoint> = target
            .points
            .values()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: score(target.distance, vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_by_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;
        target.points.retain(|_, p| {
            p.payload.get(payload_keys::PARENT_ID).and_then(|v| v.as_str()) != Some(document_id)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Metadata;
    use serde_json::json;

    fn point(id: &str, vector: Vec<f32>, parent: &str) -> Point {
        let mut payload = Metadata::new();
        payload.insert("parent_id".into(), json!(parent));
        payload.insert("content".into(), json!(format!("text of {id}")));
        Point {
            id: id.to_string(),
            vector,
            payload,
        }
    }

    #[test]
    fn cosine_of_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 3, Distance::Cosine).await.unwrap();
        let err = index
            .create_collection("docs", 3, Distance::Cosine)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn search_returns_best_first() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 2, Distance::Cosine).await.unwrap();
        index
            .upsert(
                "docs",
                vec![
                    point("a", vec![1.0, 0.0], "d1"),
                    point("b", vec![0.7, 0.7], "d1"),
                    point("c", vec![0.0, 1.0], "d2"),
                ],
            )
            .await
            .unwrap();

        let hits = index.search("docs", &[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 4, Distance::Cosine).await.unwrap();
        let err = index
            .upsert("docs", vec![point("a", vec![1.0, 0.0], "d1")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch { expected: 4, actual: 2, .. }
        ));
        assert_eq!(index.point_count("docs").await, Some(0));
    }

    #[tokio::test]
    async fn delete_by_document_keeps_other_documents() {
        let index = InMemoryIndex::new();
        index.create_collection("docs", 2, Distance::Cosine).await.unwrap();
        index
            .upsert(
                "docs",
                vec![
                    point("a", vec![1.0, 0.0], "d1"),
                    point("b", vec![0.0, 1.0], "d1"),
                    point("c", vec![0.5, 0.5], "d2"),
                ],
            )
            .await
            .unwrap();

        index.delete_by_document("docs", "d1").await.unwrap();
        assert_eq!(index.point_count("docs").await, Some(1));
        let hits = index.search("docs", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits[0].id, "c");
    }

    #[tokio::test]
    async fn missing_collection_is_reported() {
        let index = InMemoryIndex::new();
        let err = index.search("nope", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, IndexError::CollectionNotFound(_)));
        assert!(!index.delete_collection("nope").await.unwrap());
    }
}
