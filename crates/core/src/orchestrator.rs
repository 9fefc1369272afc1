use crate::classifier::{ensure_categories, CategoryClassifier};
use crate::error::Result;
use crate::extractor::TextExtractor;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Extract, then classify. No caching: every call repeats both steps.
#[derive(Clone)]
pub struct Orchestrator {
    extractor: Arc<dyn TextExtractor>,
    classifier: CategoryClassifier,
}

impl Orchestrator {
    pub fn new(extractor: Arc<dyn TextExtractor>, classifier: CategoryClassifier) -> Self {
        Self {
            extractor,
            classifier,
        }
    }

    #[instrument(skip(self, path, categories), fields(path = %path.display()))]
    pub async fn classify_file(&self, path: &Path, categories: &[String]) -> Result<String> {
        ensure_categories(categories)?;
        let text = self.extractor.extract(path).await?;
        let label = self.classifier.classify(&text, categories).await?;
        info!(label = %label, chars = text.len(), "document classified");
        Ok(label)
    }
}
