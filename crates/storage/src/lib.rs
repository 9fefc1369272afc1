//! Storage layer: SQLite schema and helpers.
//!
//! Holds DB pool setup, the migration runner, and the queries for
//! file records and per-user classification options.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub mod files;
pub mod models;
pub mod options;

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}", norm);
        }
    }
    let connect_opts = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") {
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect_with(connect_opts).await?;
    tracing::debug!(url = %url, "database connected");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies SQLx migrations located in crates/storage/migrations.
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// In-memory database with the schema applied.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = connect("sqlite::memory:").await.unwrap();
    migrate(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let pool = test_pool().await;
        migrate(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn connect_creates_missing_database_file() {
        let dir = std::env::temp_dir().join(format!("storage-connect-{}", std::process::id()));
        let db = dir.join("nested").join("library.db");
        let pool = connect(db.to_str().unwrap()).await.unwrap();
        migrate(&pool).await.unwrap();
        assert!(db.exists());
        pool.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
