//! User-scoped document library: uploads, listing, confirmation, deletion
//! and the option set that grows from confirmed labels.

use crate::error::{Error, Result};
use crate::models::{Confirmed, FileSummary, ListQuery, UploadBatch, UploadedFile, UserId};
use crate::options::{candidate_categories, should_register};
use crate::orchestrator::Orchestrator;
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::models::FileFilter;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct LibrarySettings {
    pub storage_root: PathBuf,
    pub default_options: Vec<String>,
    pub min_custom_options: usize,
}

#[derive(Clone)]
pub struct DocumentLibrary {
    pool: SqlitePool,
    orchestrator: Orchestrator,
    settings: Arc<LibrarySettings>,
}

impl DocumentLibrary {
    pub fn new(pool: SqlitePool, orchestrator: Orchestrator, settings: LibrarySettings) -> Self {
        Self {
            pool,
            orchestrator,
            settings: Arc::new(settings),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn user_dir(&self, user: UserId) -> PathBuf {
        self.settings.storage_root.join(format!("user_{}", user))
    }

    pub async fn candidate_categories(&self, user: UserId) -> Result<Vec<String>> {
        let existing = storage::options::list_option_names(&self.pool, user.0).await?;
        Ok(candidate_categories(
            &existing,
            &self.settings.default_options,
            self.settings.min_custom_options,
        ))
    }

    /// Stores and classifies each file in order. The first failure aborts the batch.
    #[instrument(skip(self, user, files), fields(user = %user, count = files.len()))]
    pub async fn upload_many(
        &self,
        user: UserId,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<UploadBatch> {
        if files.is_empty() {
            return Err(Error::InvalidInput("No files provided.".to_string()));
        }
        let options = self.candidate_categories(user).await?;
        let mut uploaded = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            uploaded.push(self.store_and_classify(user, &name, &bytes, &options).await?);
        }
        Ok(UploadBatch {
            uploaded_files: uploaded,
            options_used: options,
        })
    }

    pub async fn upload(&self, user: UserId, file_name: &str, bytes: &[u8]) -> Result<UploadedFile> {
        let options = self.candidate_categories(user).await?;
        self.store_and_classify(user, file_name, bytes, &options).await
    }

    async fn store_and_classify(
        &self,
        user: UserId,
        file_name: &str,
        bytes: &[u8],
        options: &[String],
    ) -> Result<UploadedFile> {
        let name = sanitize_file_name(file_name)?;
        let dir = self.user_dir(user);
        tokio::fs::create_dir_all(&dir).await?;
        let (path, mut file) = create_unique(&dir, &name).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        debug!(path = %path.display(), bytes = bytes.len(), "stored upload");

        let suggestion = self.orchestrator.classify_file(&path, options).await?;

        let file_path = path.to_string_lossy().into_owned();
        let id = storage::files::insert_file(&self.pool, user.0, &name, &file_path, Utc::now())
            .await?;
        info!(id, file = %name, suggestion = %suggestion, "file uploaded");

        Ok(UploadedFile {
            id,
            file_name: name,
            file_path,
            classification: suggestion.clone(),
            suggested_classification: suggestion,
        })
    }

    pub async fn list(&self, user: UserId, query: &ListQuery) -> Result<Vec<FileSummary>> {
        let filter = FileFilter {
            name_contains: query.q.clone(),
            classification_contains: query.classification.clone(),
        };
        let rows = storage::files::list_files(&self.pool, user.0, &filter).await?;
        Ok(rows.into_iter().map(FileSummary::from).collect())
    }

    /// Persists the user's label and registers it as an option unless it is "none".
    #[instrument(skip(self, user), fields(user = %user))]
    pub async fn confirm(&self, user: UserId, id: i64, classification: &str) -> Result<Confirmed> {
        if classification.is_empty() {
            return Err(Error::InvalidInput(
                "id and classification are required".to_string(),
            ));
        }
        if !storage::files::set_classification(&self.pool, user.0, id, classification).await? {
            return Err(Error::NotFound("File not found".to_string()));
        }
        let option_added = if should_register(classification) {
            storage::options::add_option(&self.pool, user.0, classification.trim()).await?
        } else {
            false
        };
        info!(id, classification, option_added, "classification confirmed");
        Ok(Confirmed {
            id,
            classification: classification.to_string(),
            option_added,
        })
    }

    /// File removal is advisory; metadata removal is authoritative.
    #[instrument(skip(self, user), fields(user = %user))]
    pub async fn delete(&self, user: UserId, id: i64) -> Result<()> {
        let row = storage::files::get_file(&self.pool, user.0, id)
            .await?
            .ok_or_else(|| Error::NotFound("File not found".to_string()))?;
        match tokio::fs::remove_file(&row.file_path).await {
            Ok(()) => debug!(path = %row.file_path, "removed stored file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %row.file_path, "stored file already gone")
            }
            Err(e) => warn!(path = %row.file_path, error = %e, "could not remove stored file"),
        }
        storage::files::delete_file(&self.pool, user.0, id).await?;
        info!(id, "file deleted");
        Ok(())
    }

    /// The user's option names, seeding the defaults when there are none.
    pub async fn options(&self, user: UserId) -> Result<Vec<String>> {
        let existing = storage::options::list_option_names(&self.pool, user.0).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        for name in &self.settings.default_options {
            storage::options::add_option(&self.pool, user.0, name).await?;
        }
        Ok(storage::options::list_option_names(&self.pool, user.0).await?)
    }
}

/// Opens a fresh file in `dir`, suffixing the stem when `name` is taken so
/// every record owns its stored copy.
async fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
    let original = Path::new(name);
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let ext = original.extension().and_then(|s| s.to_str());
    for n in 0..u32::MAX {
        let candidate = match (n, ext) {
            (0, _) => name.to_string(),
            (_, Some(ext)) => format!("{}_{}.{}", stem, n, ext),
            (_, None) => format!("{}_{}", stem, n),
        };
        let path = dir.join(candidate);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Storage(format!("no free file name for {}", name)))
}

/// Keeps only the final path component of a client-supplied name.
pub fn sanitize_file_name(raw: &str) -> Result<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidInput(format!("invalid file name: {:?}", raw)));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{CategoryClassifier, ClassifierConfig, LabelNormalization};
    use crate::error::ExtractError;
    use crate::extractor::TextExtractor;
    use crate::options::DEFAULT_OPTIONS;
    use providers::{CompletionProvider, CompletionRequest, ProviderError};
    use std::sync::Mutex;

    struct FixedText;

    #[async_trait::async_trait]
    impl TextExtractor for FixedText {
        async fn extract(&self, path: &Path) -> std::result::Result<String, ExtractError> {
            Ok(format!("contents of {}", path.display()))
        }
    }

    #[derive(Default)]
    struct EchoFirstCategory {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl CompletionProvider for EchoFirstCategory {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> std::result::Result<String, ProviderError> {
            self.seen.lock().unwrap().push(request.user.clone());
            let line = request
                .user
                .lines()
                .find_map(|l| l.strip_prefix("Categories: "))
                .unwrap_or("none");
            Ok(line.split(", ").next().unwrap_or("none").to_string())
        }
    }

    async fn library(root: &Path) -> (DocumentLibrary, Arc<EchoFirstCategory>) {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::migrate(&pool).await.unwrap();
        let provider = Arc::new(EchoFirstCategory::default());
        let classifier = CategoryClassifier::new(
            provider.clone(),
            ClassifierConfig {
                model: "llama3.1:8b".into(),
                normalization: LabelNormalization::Verbatim,
            },
        );
        let lib = DocumentLibrary::new(
            pool,
            Orchestrator::new(Arc::new(FixedText), classifier),
            LibrarySettings {
                storage_root: root.to_path_buf(),
                default_options: DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect(),
                min_custom_options: 3,
            },
        );
        (lib, provider)
    }

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);

    #[tokio::test]
    async fn upload_returns_suggestion_but_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;

        let up = lib.upload(ALICE, "scan.png", b"bytes").await.unwrap();
        assert_eq!(up.suggested_classification, "Driver License");
        assert_eq!(up.classification, "Driver License");
        assert!(Path::new(&up.file_path).exists());
        assert!(up.file_path.contains("user_1"));

        let listed = lib.list(ALICE, &ListQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].classification, None);
    }

    #[tokio::test]
    async fn upload_many_rejects_empty_batch_and_reports_options() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;

        assert!(matches!(
            lib.upload_many(ALICE, vec![]).await,
            Err(Error::InvalidInput(_))
        ));

        let batch = lib
            .upload_many(
                ALICE,
                vec![("a.png".into(), b"1".to_vec()), ("b.png".into(), b"2".to_vec())],
            )
            .await
            .unwrap();
        assert_eq!(batch.uploaded_files.len(), 2);
        assert_eq!(batch.options_used, DEFAULT_OPTIONS.to_vec());
    }

    #[tokio::test]
    async fn upload_strips_directories_from_names() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;

        let up = lib.upload(ALICE, "../../etc/passwd", b"x").await.unwrap();
        assert_eq!(up.file_name, "passwd");
        assert!(Path::new(&up.file_path).starts_with(dir.path().join("user_1")));
        assert!(lib.upload(ALICE, "..", b"x").await.is_err());
    }

    #[tokio::test]
    async fn confirming_twice_registers_option_once() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let a = lib.upload(ALICE, "a.png", b"1").await.unwrap();
        let b = lib.upload(ALICE, "b.png", b"2").await.unwrap();

        assert!(lib.confirm(ALICE, a.id, "Invoice").await.unwrap().option_added);
        assert!(!lib.confirm(ALICE, b.id, "Invoice").await.unwrap().option_added);

        let names = storage::options::list_option_names(lib.pool(), ALICE.0)
            .await
            .unwrap();
        assert_eq!(names, vec!["Invoice"]);
    }

    #[tokio::test]
    async fn confirmed_label_is_registered_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let a = lib.upload(ALICE, "a.png", b"1").await.unwrap();
        let b = lib.upload(ALICE, "b.png", b"2").await.unwrap();

        assert!(lib.confirm(ALICE, a.id, "Invoice").await.unwrap().option_added);
        assert!(!lib.confirm(ALICE, b.id, " Invoice ").await.unwrap().option_added);

        let names = storage::options::list_option_names(lib.pool(), ALICE.0)
            .await
            .unwrap();
        assert_eq!(names, vec!["Invoice"]);
    }

    #[tokio::test]
    async fn same_name_uploads_keep_separate_copies() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let first = lib.upload(ALICE, "scan.png", b"first").await.unwrap();
        let second = lib.upload(ALICE, "scan.png", b"second").await.unwrap();

        assert_eq!(first.file_name, "scan.png");
        assert_eq!(second.file_name, "scan.png");
        assert_ne!(first.file_path, second.file_path);
        assert!(second.file_path.ends_with("scan_1.png"));

        lib.delete(ALICE, first.id).await.unwrap();
        assert!(!Path::new(&first.file_path).exists());
        assert_eq!(std::fs::read(&second.file_path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn confirming_none_never_adds_option() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let a = lib.upload(ALICE, "a.png", b"1").await.unwrap();

        for label in ["none", "NONE", "None"] {
            let c = lib.confirm(ALICE, a.id, label).await.unwrap();
            assert!(!c.option_added);
        }
        let names = storage::options::list_option_names(lib.pool(), ALICE.0)
            .await
            .unwrap();
        assert!(names.is_empty());

        let listed = lib.list(ALICE, &ListQuery::default()).await.unwrap();
        assert_eq!(listed[0].classification.as_deref(), Some("None"));
    }

    #[tokio::test]
    async fn confirm_validates_input_and_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let a = lib.upload(ALICE, "a.png", b"1").await.unwrap();

        assert!(matches!(
            lib.confirm(ALICE, a.id, "").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            lib.confirm(BOB, a.id, "Invoice").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            lib.confirm(ALICE, 999, "Invoice").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_with_missing_file_still_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let a = lib.upload(ALICE, "a.png", b"1").await.unwrap();
        std::fs::remove_file(&a.file_path).unwrap();

        lib.delete(ALICE, a.id).await.unwrap();
        assert!(lib.list(ALICE, &ListQuery::default()).await.unwrap().is_empty());
        assert!(matches!(
            lib.delete(ALICE, a.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_stored_file_and_respects_owner() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let a = lib.upload(ALICE, "a.png", b"1").await.unwrap();

        assert!(matches!(lib.delete(BOB, a.id).await, Err(Error::NotFound(_))));
        assert!(Path::new(&a.file_path).exists());

        lib.delete(ALICE, a.id).await.unwrap();
        assert!(!Path::new(&a.file_path).exists());
    }

    #[tokio::test]
    async fn classification_filter_is_case_insensitive_substring() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;
        let inv = lib.upload(ALICE, "bill.png", b"1").await.unwrap();
        let pass = lib.upload(ALICE, "id.png", b"2").await.unwrap();
        lib.confirm(ALICE, inv.id, "Invoice").await.unwrap();
        lib.confirm(ALICE, pass.id, "Passport").await.unwrap();

        let hits = lib
            .list(
                ALICE,
                &ListQuery {
                    classification: Some("voice".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, inv.id);

        let by_name = lib
            .list(
                ALICE,
                &ListQuery {
                    q: Some("BILL".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert!(lib.list(BOB, &ListQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn options_seed_exactly_the_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, _) = library(dir.path()).await;

        assert_eq!(lib.options(ALICE).await.unwrap(), DEFAULT_OPTIONS.to_vec());
        assert_eq!(lib.options(ALICE).await.unwrap(), DEFAULT_OPTIONS.to_vec());
    }

    #[tokio::test]
    async fn candidates_pad_small_custom_sets() {
        let dir = tempfile::tempdir().unwrap();
        let (lib, provider) = library(dir.path()).await;
        let a = lib.upload(ALICE, "a.png", b"1").await.unwrap();
        lib.confirm(ALICE, a.id, "Receipt").await.unwrap();

        lib.upload(ALICE, "b.png", b"2").await.unwrap();
        let prompts = provider.seen.lock().unwrap();
        assert!(prompts[1].contains(
            "Categories: Receipt, Driver License, Passport, Invoice, Contract\n"
        ));
    }
}
