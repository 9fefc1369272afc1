use crate::models::{FileFilter, FileRow};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool};

pub async fn insert_file(
    pool: &SqlitePool,
    user_id: i64,
    file_name: &str,
    file_path: &str,
    uploaded_at: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO files (user_id, file_name, file_path, classification, uploaded_at) VALUES (?, ?, ?, NULL, ?)",
    )
    .bind(user_id)
    .bind(file_name)
    .bind(file_path)
    .bind(uploaded_at)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

pub async fn get_file(
    pool: &SqlitePool,
    user_id: i64,
    id: i64,
) -> Result<Option<FileRow>, sqlx::Error> {
    sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Newest first. Both filters are case-insensitive substring matches.
pub async fn list_files(
    pool: &SqlitePool,
    user_id: i64,
    filter: &FileFilter,
) -> Result<Vec<FileRow>, sqlx::Error> {
    let mut qb = QueryBuilder::new("SELECT * FROM files WHERE user_id = ");
    qb.push_bind(user_id);
    if let Some(q) = filter.name_contains.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND instr(lower(file_name), lower(");
        qb.push_bind(q.to_string());
        qb.push(")) > 0");
    }
    if let Some(c) = filter
        .classification_contains
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        qb.push(" AND classification IS NOT NULL AND instr(lower(classification), lower(");
        qb.push_bind(c.to_string());
        qb.push(")) > 0");
    }
    qb.push(" ORDER BY uploaded_at DESC, id DESC");
    qb.build_query_as::<FileRow>().fetch_all(pool).await
}

/// Returns false when no row of this user has the id.
pub async fn set_classification(
    pool: &SqlitePool,
    user_id: i64,
    id: i64,
    classification: &str,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE files SET classification = ? WHERE id = ? AND user_id = ?")
        .bind(classification)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_file(pool: &SqlitePool, user_id: i64, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM files WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
