use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::{now_unix_secs, UserId, SYSTEM_USER_ID};

/// Ensures the reserved system user row exists. Called once at startup
/// before any auto-tracked watches are created (§3, §9).
pub async fn ensure_system_user(pool: &SqlitePool) -> Result<()> {
    let id = SYSTEM_USER_ID.0.to_string();
    let now = now_unix_secs();
    sqlx::query!(
        r#"
        INSERT INTO users (id, email, messaging_channel_address, webhook_url, deleted, created_at)
        VALUES (?, 'system@internal', NULL, NULL, 0, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
        id,
        now,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    messaging_channel_address: Option<&str>,
    webhook_url: Option<&str>,
) -> Result<UserId> {
    let id = UserId::new();
    let id_str = id.0.to_string();
    let now = now_unix_secs();
    sqlx::query!(
        r#"
        INSERT INTO users (id, email, messaging_channel_address, webhook_url, deleted, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
        id_str,
        email,
        messaging_channel_address,
        webhook_url,
        now,
    )
    .execute(pool)
    .await?;
    Ok(id)
}

/// Soft-deletes a user; rows are never hard-deleted (§3).
pub async fn soft_delete_user(pool: &SqlitePool, user_id: UserId) -> Result<()> {
    let id_str = user_id.0.to_string();
    sqlx::query!("UPDATE users SET deleted = 1 WHERE id = ?", id_str)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_user(pool: &SqlitePool, user_id: UserId) -> Result<Option<super::models::UserRow>> {
    let id_str = user_id.0.to_string();
    let row = sqlx::query_as!(
        super::models::UserRow,
        r#"SELECT id, email, messaging_channel_address, webhook_url, deleted FROM users WHERE id = ?"#,
        id_str,
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool;

    async fn test_pool() -> SqlitePool {
        pool::init("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn ensure_system_user_is_idempotent() {
        let pool = test_pool().await;
        ensure_system_user(&pool).await.unwrap();
        ensure_system_user(&pool).await.unwrap();
        let row = get_user(&pool, SYSTEM_USER_ID).await.unwrap();
        assert!(row.is_some());
    }

    #[tokio::test]
    async fn create_user_assigns_unique_id() {
        let pool = test_pool().await;
        let a = create_user(&pool, "a@example.com", None, None).await.unwrap();
        let b = create_user(&pool, "b@example.com", None, None).await.unwrap();
        assert_ne!(a.0, b.0);
    }

    #[tokio::test]
    async fn soft_delete_does_not_remove_row() {
        let pool = test_pool().await;
        let id = create_user(&pool, "a@example.com", None, None).await.unwrap();
        soft_delete_user(&pool, id).await.unwrap();
        let row = get_user(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.deleted, 1);
    }
}
