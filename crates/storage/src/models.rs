use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FileRow {
    pub id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub file_path: String,
    /// Set only once the user confirms a label.
    pub classification: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub name_contains: Option<String>,
    pub classification_contains: Option<String>,
}
