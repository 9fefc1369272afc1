use sqlx::{Row, SqlitePool};

/// Option names for a user in insertion order.
pub async fn list_option_names(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT name FROM classification_options WHERE user_id = ? ORDER BY id")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
}

/// Get-or-create. Returns true if the name was newly added.
pub async fn add_option(pool: &SqlitePool, user_id: i64, name: &str) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO classification_options (user_id, name) VALUES (?, ?)
         ON CONFLICT(user_id, name) DO NOTHING",
    )
    .bind(user_id)
    .bind(name)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    #[tokio::test]
    async fn add_option_is_idempotent_per_user() {
        let pool = test_pool().await;
        assert!(add_option(&pool, 1, "Invoice").await.unwrap());
        assert!(!add_option(&pool, 1, "Invoice").await.unwrap());
        assert!(add_option(&pool, 2, "Invoice").await.unwrap());
        assert!(add_option(&pool, 1, "Receipt").await.unwrap());

        assert_eq!(
            list_option_names(&pool, 1).await.unwrap(),
            vec!["Invoice".to_string(), "Receipt".to_string()]
        );
        assert_eq!(list_option_names(&pool, 2).await.unwrap(), vec!["Invoice"]);
        assert!(list_option_names(&pool, 3).await.unwrap().is_empty());
    }
}
