use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use quarry_core::{payload_keys, Metadata};

use crate::error::IndexError;
use crate::traits::VectorIndex;
use crate::types::{CollectionInfo, Distance, Point, ScoredPoint};

/// Vector index backed by the Qdrant REST API.
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantIndex {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, IndexError> {
        let response = self.request(builder).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(IndexError::Api { status, body })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, IndexError> {
        let envelope: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| IndexError::Parse(e.to_string()))?;
        Ok(envelope.result)
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionsList {
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Deserialize)]
struct CollectionDetails {
    config: CollectionConfig,
    #[serde(default)]
    points_count: Option<u64>,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: Value,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: &'a [Point],
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Metadata>,
}

fn parse_distance(value: &str) -> Option<Distance> {
    match value {
        "Cosine" => Some(Distance::Cosine),
        "Dot" => Some(Distance::Dot),
        "Euclid" => Some(Distance::Euclid),
        _ => None,
    }
}

/// Qdrant ids are either UUID strings or unsigned integers.
fn point_id_string(id: Value) -> String {
    match id {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn is_already_exists(status: u16, body: &str) -> bool {
    status == StatusCode::CONFLICT.as_u16()
        || (status == StatusCode::BAD_REQUEST.as_u16() && body.contains("already exists"))
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        let url = format!("{}/collections", self.base_url);
        debug!(%url, "Qdrant list collections");
        let response = self.send(self.client.get(&url)).await?;
        let list: CollectionsList = Self::parse(response).await?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), IndexError> {
        let body = json!({
            "vectors": { "size": dimensions, "distance": distance.as_str() },
        });
        debug!(collection = name, dimensions, "Qdrant create collection");
        match self.send(self.client.put(self.collection_url(name)).json(&body)).await {
            Ok(_) => Ok(()),
            Err(IndexError::Api { status, body }) if is_already_exists(status, &body) => {
                Err(IndexError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, IndexError> {
        let response = match self.send(self.client.get(self.collection_url(name))).await {
            Ok(r) => r,
            Err(IndexError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let details: CollectionDetails = Self::parse(response).await?;
        let vectors = &details.config.params.vectors;
        Ok(Some(CollectionInfo {
            name: name.to_string(),
            dimensions: vectors
                .get("size")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize),
            distance: vectors
                .get("distance")
                .and_then(|v| v.as_str())
                .and_then(parse_distance),
            points_count: details.points_count,
        }))
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, IndexError> {
        match self.send(self.client.delete(self.collection_url(name))).await {
            Ok(response) => Self::parse::<bool>(response).await,
            Err(IndexError::Api { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), IndexError> {
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let body = UpsertRequest { points: &points };
        match self.send(self.client.put(&url).json(&body)).await {
            Ok(_) => Ok(()),
            Err(IndexError::Api { status: 404, .. }) => {
                Err(IndexError::CollectionNotFound(collection.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        debug!(collection, limit, "Qdrant search");
        let response = match self.send(self.client.post(&url).json(&body)).await {
            Ok(r) => r,
            Err(IndexError::Api { status: 404, .. }) => {
                return Err(IndexError::CollectionNotFound(collection.to_string()))
            }
            Err(e) => return Err(e),
        };
        let hits: Vec<SearchHit> = Self::parse(response).await?;
        hits.into_iter()
            .map(|hit| {
                let payload = hit
                    .payload
                    .ok_or_else(|| IndexError::Parse("search hit without payload".into()))?;
                Ok(ScoredPoint {
                    id: point_id_string(hit.id),
                    score: hit.score,
                    payload,
                })
            })
            .collect()
    }

    async fn delete_by_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<(), IndexError> {
        let url = format!("{}/points/delete?wait=true", self.collection_url(collection));
        let body = json!({
            "filter": {
                "must": [
                    { "key": payload_keys::PARENT_ID, "match": { "value": document_id } }
                ]
            }
        });
        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }
}
