use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{LlmError, LlmProvider, Message};

pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(url: String, model: String, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn message_content(body: &str) -> Result<String, LlmError> {
    let resp: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::ParseError(e.to_string()))?;
    resp.message
        .and_then(|m| m.content)
        .ok_or(LlmError::EmptyResponse)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.url);
        debug!(%url, model = %self.model, "Ollama completion request");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                model: &self.model,
                messages: &messages,
                stream: false,
                options: ChatOptions {
                    temperature,
                    num_predict: max_tokens,
                },
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            return Err(LlmError::ApiError { status, body });
        }
        message_content(&body)
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
        let provider =
            OllamaProvider::new(url, "llama3.2".into(), Duration::from_millis(50)).unwrap();

        let err = provider
            .complete(vec![Message::user("hi")], 0.3, 16)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)), "{err:?}");
        server.abort();
    }

    #[test]
    fn reads_message_content() {
        let body = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Hi"},"done":true}"#;
        assert_eq!(message_content(body).unwrap(), "Hi");
    }

    #[test]
    fn missing_message_is_empty_response() {
        assert!(matches!(message_content(r#"{"done":true}"#), Err(LlmError::EmptyResponse)));
    }
}
