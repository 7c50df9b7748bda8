use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{check_vectors, Embedder, EmbeddingError};

/// Embedder backed by a local Ollama instance.
pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(
        url: String,
        model: String,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.trim_end_matches('/').to_string(),
            model,
            dimensions,
        })
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.url);
        debug!(%url, model = %self.model, inputs = texts.len(), "requesting embeddings");

        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbedRequest {
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

        let parsed: OllamaEmbedResponse = response.json().await?;
        check_vectors(&parsed.embeddings, texts.len(), self.dimensions)?;
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts connections and never answers, so every request hits the client timeout.
    async fn silent_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn unresponsive_server_is_a_timeout() {
        let (url, server) = silent_server().await;
        let embedder =
            OllamaEmbedder::new(url, "nomic-embed-text".into(), 3, Duration::from_millis(50))
                .unwrap();

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Timeout(_)), "{err:?}");
        server.abort();
    }

    #[test]
    fn parses_embed_response() {
        let body = r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2,0.3]]}"#;
        let parsed: OllamaEmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 1);
        assert_eq!(parsed.embeddings[0].len(), 3);
    }
}
