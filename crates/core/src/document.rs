use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON metadata attached to documents and passages.
pub type Metadata = Map<String, Value>;

/// Payload keys written by the ingestor next to the caller's metadata.
pub mod payload_keys {
    pub const CONTENT: &str = "content";
    pub const PARENT_ID: &str = "parent_id";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
}

/// A passage returned by similarity search, scored by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub content: String,
    /// Stored payload without the `content` key.
    pub metadata: Metadata,
    /// Index-defined similarity; higher is more relevant.
    pub similarity: f32,
}

impl RetrievedPassage {
    /// Build a passage from a stored point payload, splitting `content` out of
    /// the metadata map. A payload without text content yields an empty string.
    pub fn from_payload(mut payload: Metadata, similarity: f32) -> Self {
        let content = match payload.remove(payload_keys::CONTENT) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self {
            content,
            metadata: payload,
            similarity,
        }
    }

    /// Parent document id, when the passage came from the ingestor.
    pub fn parent_id(&self) -> Option<&str> {
        self.metadata
            .get(payload_keys::PARENT_ID)
            .and_then(|v| v.as_str())
    }

    pub fn chunk_index(&self) -> Option<u64> {
        self.metadata
            .get(payload_keys::CHUNK_INDEX)
            .and_then(|v| v.as_u64())
    }
}

/// A grounded answer together with the passages rendered into its prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub response: String,
    pub context: Vec<RetrievedPassage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passage_splits_content_from_payload() {
        let payload = json!({
            "content": "Rust has no garbage collector.",
            "parent_id": "doc-1",
            "chunk_index": 3,
            "filename": "rust.txt",
        });
        let Value::Object(map) = payload else { unreachable!() };

        let passage = RetrievedPassage::from_payload(map, 0.87);
        assert_eq!(passage.content, "Rust has no garbage collector.");
        assert!(!passage.metadata.contains_key("content"));
        assert_eq!(passage.parent_id(), Some("doc-1"));
        assert_eq!(passage.chunk_index(), Some(3));
        assert_eq!(passage.metadata["filename"], "rust.txt");
        assert!((passage.similarity - 0.87).abs() < f32::EPSILON);
    }

    #[test]
    fn passage_without_content_is_empty() {
        let passage = RetrievedPassage::from_payload(Metadata::new(), 0.1);
        assert!(passage.content.is_empty());
        assert!(passage.parent_id().is_none());
    }

    #[test]
    fn generation_result_serializes() {
        let result = GenerationResult {
            response: "42".to_string(),
            context: vec![],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"response\":\"42\""));
        assert!(json.contains("\"context\":[]"));
    }
}
