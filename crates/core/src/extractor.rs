//! Text extraction: OCR for scans and images, direct reads for text and PDF.

use crate::config::OcrConfig;
use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
    Image,
    Other(String),
}

/// Runs the `tesseract` binary and captures stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub binary: String,
    pub lang: String,
}

impl TesseractCli {
    pub fn new(binary: Option<&str>, lang: &str) -> Self {
        Self {
            binary: binary.unwrap_or("tesseract").to_string(),
            lang: lang.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl TextExtractor for TesseractCli {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!(binary = %self.binary, path = %path.display(), "running tesseract");
        let output = tokio::process::Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .await
            .map_err(|e| ExtractError::Engine(format!("failed to run {}: {}", self.binary, e)))?;
        if !output.status.success() {
            return Err(ExtractError::Engine(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// In-process Tesseract through leptess.
#[cfg(feature = "ocr")]
#[derive(Debug, Clone)]
pub struct LeptessOcr {
    pub lang: String,
}

#[cfg(feature = "ocr")]
#[async_trait::async_trait]
impl TextExtractor for LeptessOcr {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let path = path.to_path_buf();
        let lang = self.lang.clone();
        tokio::task::spawn_blocking(move || {
            let mut lt = leptess::LepTess::new(None, &lang)
                .map_err(|e| ExtractError::Engine(e.to_string()))?;
            lt.set_image(&path)
                .map_err(|e| ExtractError::Engine(e.to_string()))?;
            lt.get_utf8_text()
                .map_err(|e| ExtractError::Engine(e.to_string()))
        })
        .await
        .map_err(|e| ExtractError::Engine(e.to_string()))?
    }
}

/// Dispatches on document type: text is read directly, PDFs go through
/// pdf-extract, images go to the OCR engine.
pub struct DocumentExtractor {
    ocr: Arc<dyn TextExtractor>,
    max_text_bytes: usize,
}

impl DocumentExtractor {
    pub fn new(ocr: Arc<dyn TextExtractor>, max_text_bytes: usize) -> Self {
        Self {
            ocr,
            max_text_bytes,
        }
    }
}

#[async_trait::async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        if !tokio::fs::try_exists(path).await? {
            return Err(ExtractError::NotFound(path.display().to_string()));
        }
        let owned = path.to_path_buf();
        let kind = tokio::task::spawn_blocking(move || detect_kind(&owned))
            .await
            .map_err(|e| ExtractError::Engine(e.to_string()))??;
        debug!(path = %path.display(), kind = ?kind, "extracting text");
        match kind {
            DocumentKind::Text => read_text(path, self.max_text_bytes).await,
            DocumentKind::Pdf => pdf_text(path.to_path_buf()).await,
            DocumentKind::Image => self.ocr.extract(path).await,
            DocumentKind::Other(mime) => Err(ExtractError::Unsupported(mime)),
        }
    }
}

pub fn build_extractor(cfg: &OcrConfig) -> anyhow::Result<Arc<dyn TextExtractor>> {
    let ocr: Arc<dyn TextExtractor> = match cfg.engine.as_str() {
        "tesseract-cli" | "tesseract" => {
            Arc::new(TesseractCli::new(cfg.binary.as_deref(), &cfg.lang))
        }
        #[cfg(feature = "ocr")]
        "leptess" => Arc::new(LeptessOcr {
            lang: cfg.lang.clone(),
        }),
        #[cfg(not(feature = "ocr"))]
        "leptess" => anyhow::bail!("ocr engine 'leptess' requires the `ocr` feature"),
        other => anyhow::bail!("unknown ocr engine: {}", other),
    };
    Ok(Arc::new(DocumentExtractor::new(ocr, cfg.max_text_bytes)))
}

pub fn detect_kind(path: &Path) -> Result<DocumentKind, ExtractError> {
    if let Some(kind) = kind_from_extension(path) {
        return Ok(kind);
    }
    let sniffed = infer::get_from_path(path)?;
    Ok(match sniffed {
        Some(t) if t.mime_type() == "application/pdf" => DocumentKind::Pdf,
        Some(t) if t.matcher_type() == infer::MatcherType::Image => DocumentKind::Image,
        Some(t) if t.mime_type().starts_with("text/") => DocumentKind::Text,
        Some(t) => DocumentKind::Other(t.mime_type().to_string()),
        None => DocumentKind::Other("application/octet-stream".to_string()),
    })
}

fn kind_from_extension(path: &Path) -> Option<DocumentKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "txt" | "md" | "log" | "csv" | "json" => Some(DocumentKind::Text),
        "pdf" => Some(DocumentKind::Pdf),
        "jpg" | "jpeg" | "png" | "tif" | "tiff" | "bmp" | "gif" | "webp" => {
            Some(DocumentKind::Image)
        }
        _ => None,
    }
}

async fn read_text(path: &Path, max_bytes: usize) -> Result<String, ExtractError> {
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::new();
    file.take(max_bytes as u64).read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(feature = "pdf")]
async fn pdf_text(path: PathBuf) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&path).map_err(|e| ExtractError::Engine(e.to_string()))
    })
    .await
    .map_err(|e| ExtractError::Engine(e.to_string()))?
}

#[cfg(not(feature = "pdf"))]
async fn pdf_text(_path: PathBuf) -> Result<String, ExtractError> {
    Err(ExtractError::Unsupported(
        "application/pdf (built without the `pdf` feature)".to_string(),
    ))
}
