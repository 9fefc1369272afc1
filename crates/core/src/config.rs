use crate::classifier::LabelNormalization;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "llama3.1:8b";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/doclassify.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Uploads land in `<root>/user_<id>/`.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "user_files".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// ollama | openai | noop
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// tesseract-cli | leptess
    pub engine: String,
    pub binary: Option<String>,
    pub lang: String,
    /// Cap for files read as plain text, in bytes.
    pub max_text_bytes: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: "tesseract-cli".to_string(),
            binary: None,
            lang: "eng".to_string(),
            max_text_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub normalization: LabelNormalization,
    pub default_options: Vec<String>,
    /// Users with fewer options than this get the defaults appended.
    pub min_custom_options: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            normalization: LabelNormalization::default(),
            default_options: crate::options::DEFAULT_OPTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_custom_options: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Identity used when a request carries no `X-User-Id` header.
    pub default_user: i64,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            default_user: 1,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("DOCLASSIFY")
            .prefix_separator("__")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_any_source() {
        let cfg: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.llm.model, DEFAULT_MODEL);
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.classification.min_custom_options, 3);
        assert_eq!(cfg.classification.normalization, LabelNormalization::Verbatim);
        assert_eq!(
            cfg.classification.default_options,
            vec!["Driver License", "Passport", "Invoice", "Contract"]
        );
        assert_eq!(cfg.server.default_user, 1);
    }

    #[test]
    fn loads_partial_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
base_url = "https://api.openai.com"

[classification]
normalization = "case_insensitive"
default_options = ["Receipt", "Payslip"]
min_custom_options = 2
"#
        )
        .unwrap();

        let cfg = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(
            cfg.classification.normalization,
            LabelNormalization::CaseInsensitive
        );
        assert_eq!(cfg.classification.default_options, vec!["Receipt", "Payslip"]);
        assert_eq!(cfg.storage.root, "user_files");
        assert_eq!(cfg.ocr.lang, "eng");
    }
}
