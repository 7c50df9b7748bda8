use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{check_vectors, Embedder, EmbeddingError};

/// OpenAI-compatible embedding backend.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Deserialize)]
struct EmbedItem {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        debug!(%url, model = %self.model, inputs = texts.len(), "requesting embeddings");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::from_status(status.as_u16(), body));
        }

        let mut resp: EmbedResponse = response.json().await?;

        // The API may return items out of order.
        resp.data.sort_by_key(|item| item.index);
        let embeddings: Vec<Vec<f32>> = resp.data.into_iter().map(|item| item.embedding).collect();

        check_vectors(&embeddings, texts.len(), self.dimensions)?;
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_inputs_in_order() {
        let texts = ["first", "second"];
        let json = serde_json::to_value(EmbedRequest {
            model: "text-embedding-ada-002",
            input: &texts,
        })
        .unwrap();
        assert_eq!(json["model"], "text-embedding-ada-002");
        assert_eq!(json["input"], serde_json::json!(["first", "second"]));
    }

    #[test]
    fn response_items_carry_their_index() {
        let body = r#"{"data":[{"embedding":[0.5,0.5],"index":1},{"embedding":[1.0,0.0],"index":0}],"model":"m"}"#;
        let mut resp: EmbedResponse = serde_json::from_str(body).unwrap();
        resp.data.sort_by_key(|item| item.index);
        assert_eq!(resp.data[0].embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let embedder = OpenAiEmbedder::new(
            "sk-test".into(),
            "text-embedding-3-small".into(),
            Some("http://localhost:8080/".into()),
            1536,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(embedder.base_url, "http://localhost:8080");
        assert_eq!(embedder.model(), "text-embedding-3-small");
        assert_eq!(embedder.dimensions(), 1536);
    }
}
