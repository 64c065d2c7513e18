use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::{
    now_unix_secs, validate_product_code, validate_target_price, UserId, WatchId, WatchStatus,
    WatchedProduct, SYSTEM_USER_ID,
};

use super::models::WatchedProductRow;

pub async fn create_watch(
    pool: &SqlitePool,
    user_id: UserId,
    product_code: &str,
    product_title: &str,
    target_price: f64,
) -> Result<WatchId> {
    validate_product_code(product_code)?;
    validate_target_price(target_price)?;

    let id = WatchId::new();
    let id_str = id.0.to_string();
    let user_str = user_id.0.to_string();
    let now = now_unix_secs();
    let status = WatchStatus::Active.to_string();

    sqlx::query!(
        r#"
        INSERT INTO watched_products
            (id, user_id, product_code, product_title, current_price, target_price,
             volatility_score, status, last_checked_at, last_price_change_at, created_at)
        VALUES (?, ?, ?, ?, NULL, ?, 0, ?, NULL, NULL, ?)
        "#,
        id_str,
        user_str,
        product_code,
        product_title,
        target_price,
        status,
        now,
    )
    .execute(pool)
    .await?;

    Ok(id)
}

/// Returns every watch with status=ACTIVE (§4.3).
pub async fn get_active_watches(pool: &SqlitePool) -> Result<Vec<WatchedProduct>> {
    let status = WatchStatus::Active.to_string();
    let rows = sqlx::query_as!(
        WatchedProductRow,
        r#"
        SELECT id, user_id, product_code, product_title, current_price, target_price,
               volatility_score, status, last_checked_at, last_price_change_at
        FROM watched_products
        WHERE status = ?
        "#,
        status,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Atomically updates a watch's current price, last-checked and
/// last-price-change timestamps, and inserts a PriceHistory row — all in
/// one transaction (§4.3). A history row is always inserted, even when the
/// price is unchanged (preserved Open Question decision, see DESIGN.md).
pub async fn update_watch_price(
    pool: &SqlitePool,
    watch_id: WatchId,
    price: f64,
    source: Option<&str>,
) -> Result<WatchedProduct> {
    let id_str = watch_id.0.to_string();
    let now = now_unix_secs();

    let mut tx = pool.begin().await?;

    let previous = sqlx::query_scalar!(
        "SELECT current_price FROM watched_products WHERE id = ?",
        id_str
    )
    .fetch_optional(&mut *tx)
    .await?
    .flatten();

    let price_changed = previous.map(|p| (p - price).abs() > f64::EPSILON).unwrap_or(true);
    let last_price_change_at = if price_changed { Some(now) } else { None };

    if price_changed {
        sqlx::query!(
            r#"
            UPDATE watched_products
            SET current_price = ?, last_checked_at = ?, last_price_change_at = ?
            WHERE id = ?
            "#,
            price,
            now,
            last_price_change_at,
            id_str,
        )
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query!(
            r#"
            UPDATE watched_products
            SET current_price = ?, last_checked_at = ?
            WHERE id = ?
            "#,
            price,
            now,
            id_str,
        )
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query!(
        r#"INSERT INTO price_history (watch_id, price, source, recorded_at) VALUES (?, ?, ?, ?)"#,
        id_str,
        price,
        source,
        now,
    )
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as!(
        WatchedProductRow,
        r#"
        SELECT id, user_id, product_code, product_title, current_price, target_price,
               volatility_score, status, last_checked_at, last_price_change_at
        FROM watched_products WHERE id = ?
        "#,
        id_str,
    )
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(row.into())
}

/// Finds or creates a WatchedProduct owned by the system user. Idempotent:
/// a second call with the same product code returns the same watch id
/// (§4.3).
pub async fn ensure_tracked_product(
    pool: &SqlitePool,
    product_code: &str,
    title: &str,
    current_price: Option<f64>,
) -> Result<WatchId> {
    validate_product_code(product_code)?;
    let user_str = SYSTEM_USER_ID.0.to_string();

    if let Some(existing) = sqlx::query_scalar!(
        "SELECT id FROM watched_products WHERE user_id = ? AND product_code = ?",
        user_str,
        product_code,
    )
    .fetch_optional(pool)
    .await?
    {
        return Ok(WatchId(
            uuid::Uuid::parse_str(&existing).unwrap_or_default(),
        ));
    }

    let id = WatchId::new();
    let id_str = id.0.to_string();
    let now = now_unix_secs();
    let status = WatchStatus::Active.to_string();
    // System-owned discovery watches have no explicit target; store the
    // current price as a sentinel target so the row satisfies the
    // strictly-positive constraint without implying a real alert threshold.
    let target_price = current_price.filter(|p| *p > 0.0).unwrap_or(0.01);

    sqlx::query!(
        r#"
        INSERT INTO watched_products
            (id, user_id, product_code, product_title, current_price, target_price,
             volatility_score, status, last_checked_at, last_price_change_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, NULL, NULL, ?)
        "#,
        id_str,
        user_str,
        product_code,
        title,
        current_price,
        target_price,
        status,
        now,
    )
    .execute(pool)
    .await?;

    Ok(id)
}

/// Updates only the last-checked timestamp, used when a price-check cycle
/// yields no usable price for this watch — the watch is still considered
/// checked (§4.2, §8 boundary behavior: "watch still updated with
/// last-checked").
pub async fn touch_last_checked(pool: &SqlitePool, watch_id: WatchId) -> Result<()> {
    let id_str = watch_id.0.to_string();
    let now = now_unix_secs();
    sqlx::query!(
        "UPDATE watched_products SET last_checked_at = ? WHERE id = ?",
        now,
        id_str,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(pool: &SqlitePool, watch_id: WatchId, status: WatchStatus) -> Result<()> {
    let id_str = watch_id.0.to_string();
    let status_str = status.to_string();
    sqlx::query!(
        "UPDATE watched_products SET status = ? WHERE id = ?",
        status_str,
        id_str,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool;

    async fn test_pool() -> SqlitePool {
        let pool = pool::init("sqlite::memory:").await.unwrap();
        super::super::users::ensure_system_user(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn ensure_tracked_product_is_idempotent() {
        let pool = test_pool().await;
        let a = ensure_tracked_product(&pool, "B07W6JN8V8", "Widget", Some(19.99))
            .await
            .unwrap();
        let b = ensure_tracked_product(&pool, "B07W6JN8V8", "Widget", Some(21.0))
            .await
            .unwrap();
        assert_eq!(a.0, b.0);
    }

    #[tokio::test]
    async fn update_watch_price_always_inserts_history_row() {
        let pool = test_pool().await;
        let user = crate::types::SYSTEM_USER_ID;
        let watch_id = create_watch(&pool, user, "B07W6JN8V8", "Widget", 45.0)
            .await
            .unwrap();

        update_watch_price(&pool, watch_id, 44.99, Some("keepa")).await.unwrap();
        update_watch_price(&pool, watch_id, 44.99, Some("keepa")).await.unwrap();

        let id_str = watch_id.0.to_string();
        let count = sqlx::query_scalar!(
            "SELECT COUNT(*) FROM price_history WHERE watch_id = ?",
            id_str
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn get_active_watches_excludes_paused() {
        let pool = test_pool().await;
        let user = crate::types::SYSTEM_USER_ID;
        let active = create_watch(&pool, user, "B07W6JN8V8", "Widget", 45.0)
            .await
            .unwrap();
        let paused = create_watch(&pool, user, "B08XYZZZZZ", "Gadget", 10.0)
            .await
            .unwrap();
        set_status(&pool, paused, WatchStatus::Paused).await.unwrap();

        let watches = get_active_watches(&pool).await.unwrap();
        assert_eq!(watches.len(), 1);
        assert_eq!(watches[0].id.0, active.0);
    }
}
