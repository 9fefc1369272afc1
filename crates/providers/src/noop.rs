use crate::{CompletionProvider, CompletionRequest, ProviderError};

#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl CompletionProvider for NoopProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
