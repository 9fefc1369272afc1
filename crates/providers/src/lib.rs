//! Provider abstractions for text-completion services.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod noop;
pub mod ollama;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// A two-part chat prompt sent to a completion service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the raw completion text for the prompt.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    llms: HashMap<String, Arc<dyn CompletionProvider>>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn CompletionProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        self.llms
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}

pub(crate) async fn read_error_body(resp: reqwest::Response) -> ProviderError {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .unwrap_or(bytes::Bytes::from_static(b""));
    ProviderError::RequestFailed(format!(
        "status {} body {}",
        status,
        String::from_utf8_lossy(&body)
    ))
}
