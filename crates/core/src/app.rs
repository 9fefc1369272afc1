use crate::classifier::{CategoryClassifier, ClassifierConfig};
use crate::config::{AppConfig, LlmConfig};
use crate::extractor::build_extractor;
use crate::library::{DocumentLibrary, LibrarySettings};
use crate::orchestrator::Orchestrator;
use anyhow::Context;
use providers::noop::NoopProvider;
use providers::ollama::{OllamaConfig, OllamaProvider};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storage::{connect, migrate};
use tracing::info;

pub fn build_registry(cfg: &LlmConfig) -> ProviderRegistry {
    let timeout = cfg.timeout_secs.map(Duration::from_secs);
    let mut reg = ProviderRegistry::new().with_llm("noop", Arc::new(NoopProvider));

    reg = reg.with_llm(
        "ollama",
        Arc::new(OllamaProvider::new(OllamaConfig {
            base_url: cfg.base_url.clone(),
            timeout,
        })),
    );

    let api_key = cfg
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    if let Some(key) = api_key {
        reg = reg.with_llm(
            "openai",
            Arc::new(OpenAiProvider::new(OpenAiConfig {
                api_key: key,
                base_url: cfg.base_url.clone(),
                timeout,
            })),
        );
    }

    reg.set_preferred_llm(&cfg.provider)
}

pub fn build_orchestrator(cfg: &AppConfig) -> anyhow::Result<Orchestrator> {
    let registry = build_registry(&cfg.llm);
    let provider = registry
        .llm(None)
        .with_context(|| format!("llm provider '{}'", cfg.llm.provider))?;
    let classifier = CategoryClassifier::new(
        provider,
        ClassifierConfig {
            model: cfg.llm.model.clone(),
            normalization: cfg.classification.normalization,
        },
    );
    let extractor = build_extractor(&cfg.ocr)?;
    Ok(Orchestrator::new(extractor, classifier))
}

pub fn library_settings(cfg: &AppConfig) -> LibrarySettings {
    LibrarySettings {
        storage_root: PathBuf::from(&cfg.storage.root),
        default_options: cfg.classification.default_options.clone(),
        min_custom_options: cfg.classification.min_custom_options,
    }
}

/// Connects the database, applies migrations and wires the library.
pub async fn open_library(cfg: &AppConfig) -> anyhow::Result<DocumentLibrary> {
    let pool = connect(&cfg.database.path).await.context("db connect")?;
    migrate(&pool).await.context("db migrate")?;
    let orchestrator = build_orchestrator(cfg)?;
    info!(
        provider = %cfg.llm.provider,
        model = %cfg.llm.model,
        storage = %cfg.storage.root,
        "document library ready"
    );
    Ok(DocumentLibrary::new(pool, orchestrator, library_settings(cfg)))
}
