use crate::{read_error_body, CompletionProvider, CompletionRequest, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

/// Client for a local Ollama daemon using the non-streaming chat API.
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    cfg: Arc<OllamaConfig>,
}

impl OllamaProvider {
    pub fn new(cfg: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait::async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream: false,
        };

        let url = format!("{}/api/chat", self.cfg.base_url.trim_end_matches('/'));
        tracing::debug!(url = %url, model = %request.model, "ollama chat request");

        let mut builder = self.client.post(url).json(&body);
        if let Some(timeout) = self.cfg.timeout {
            builder = builder.timeout(timeout);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(read_error_body(resp).await);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(parsed.message.content)
    }
}
