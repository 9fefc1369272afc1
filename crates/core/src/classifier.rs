use crate::error::{Error, Result};
use providers::{CompletionProvider, CompletionRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Label returned when the document fits none of the categories.
pub const NONE_LABEL: &str = "none";

const SYSTEM_PROMPT: &str = "You are an expert document classifier.
You will be given details about a document type extracted via OCR.
You have to classify the document into one of the provided categories based on its content.
First, understand each category and its characteristics. Then, analyze the document data to identify key features that match those characteristics.
Finally, assign the document to the most appropriate category.
If the document does not fit any category, respond with 'none'.";

/// How the raw completion text is mapped onto the category set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelNormalization {
    /// Completion text is the label, untouched.
    #[default]
    Verbatim,
    /// Trimmed text must equal a category exactly, otherwise "none".
    ExactMatch,
    /// Trimmed text matched ignoring case; the category's own spelling is returned.
    CaseInsensitive,
}

impl LabelNormalization {
    pub fn apply(self, raw: String, categories: &[String]) -> String {
        if self == LabelNormalization::Verbatim {
            return raw;
        }
        let wanted = raw.trim();
        let matched = match self {
            LabelNormalization::Verbatim => None,
            LabelNormalization::ExactMatch => categories.iter().find(|c| c.as_str() == wanted),
            LabelNormalization::CaseInsensitive => categories
                .iter()
                .find(|c| c.to_lowercase() == wanted.to_lowercase()),
        };
        matched
            .cloned()
            .unwrap_or_else(|| NONE_LABEL.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model: String,
    pub normalization: LabelNormalization,
}

/// Prompts a completion service to pick one category for a document text.
#[derive(Clone)]
pub struct CategoryClassifier {
    provider: Arc<dyn CompletionProvider>,
    cfg: ClassifierConfig,
}

impl CategoryClassifier {
    pub fn new(provider: Arc<dyn CompletionProvider>, cfg: ClassifierConfig) -> Self {
        Self { provider, cfg }
    }

    pub async fn classify(&self, text: &str, categories: &[String]) -> Result<String> {
        ensure_categories(categories)?;
        let request = build_request(&self.cfg.model, text, categories);
        debug!(
            model = %self.cfg.model,
            categories = categories.len(),
            text_len = text.len(),
            "requesting classification"
        );
        let raw = self.provider.complete(&request).await?;
        Ok(self.cfg.normalization.apply(raw, categories))
    }
}

pub(crate) fn ensure_categories(categories: &[String]) -> Result<()> {
    if categories.is_empty() {
        return Err(Error::InvalidInput(
            "categories must be a non-empty list".to_string(),
        ));
    }
    Ok(())
}

pub fn build_request(model: &str, text: &str, categories: &[String]) -> CompletionRequest {
    let user = format!(
        "Document: {}
Categories: {}

Classify the document into one of the categories listed above.
Provide only the category name as your response.
If it does not fit any category, respond with 'none'.",
        text,
        categories.join(", ")
    );
    CompletionRequest {
        model: model.to_string(),
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
