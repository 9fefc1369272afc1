use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use storage::models::FileRow;

/// Owner of files and options. Every library operation is scoped to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub id: i64,
    pub file_name: String,
    pub file_path: String,
    pub suggested_classification: String,
    /// Echo of the suggestion for display; nothing is stored until confirmed.
    pub classification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadBatch {
    pub uploaded_files: Vec<UploadedFile>,
    pub options_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSummary {
    pub id: i64,
    pub file_name: String,
    pub classification: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<FileRow> for FileSummary {
    fn from(row: FileRow) -> Self {
        Self {
            id: row.id,
            file_name: row.file_name,
            classification: row.classification,
            uploaded_at: row.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Confirmed {
    pub id: i64,
    pub classification: String,
    /// True when the label was new to the user's option set.
    pub option_added: bool,
}
