use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::SYSTEM_USER_ID;

/// One-shot startup job that seeds PriceHistory from whatever
/// CollectedDeals rows already exist so newly auto-tracked products have a
/// baseline trend before the first live price check. Idempotent: skips a
/// product if the system user already has history rows for it (§4.3).
pub async fn backfill_price_history_from_deals(pool: &SqlitePool) -> Result<u64> {
    let user_str = SYSTEM_USER_ID.0.to_string();

    let watches = sqlx::query!(
        r#"
        SELECT w.id as id, w.product_code as product_code
        FROM watched_products w
        WHERE w.user_id = ?
          AND NOT EXISTS (SELECT 1 FROM price_history h WHERE h.watch_id = w.id)
        "#,
        user_str,
    )
    .fetch_all(pool)
    .await?;

    let mut inserted = 0u64;
    for watch in watches {
        let deal = sqlx::query!(
            r#"
            SELECT current_price, collected_at
            FROM collected_deals
            WHERE product_code = ?
            ORDER BY collected_at ASC
            LIMIT 1
            "#,
            watch.product_code,
        )
        .fetch_optional(pool)
        .await?;

        let Some(deal) = deal else { continue };

        sqlx::query!(
            r#"INSERT INTO price_history (watch_id, price, source, recorded_at) VALUES (?, ?, 'backfill', ?)"#,
            watch.id,
            deal.current_price,
            deal.collected_at,
        )
        .execute(pool)
        .await?;
        inserted += 1;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{pool, watches};

    #[tokio::test]
    async fn backfill_is_idempotent() {
        let db = pool::init("sqlite::memory:").await.unwrap();
        crate::db::users::ensure_system_user(&db).await.unwrap();
        let watch_id = watches::ensure_tracked_product(&db, "B07W6JN8V8", "Widget", None)
            .await
            .unwrap();
        let id_str = watch_id.0.to_string();

        sqlx::query!(
            r#"INSERT INTO collected_deals
               (product_code, title, current_price, original_price, discount_percent,
                rating, review_count, sales_rank, market_domain, category, deal_score,
                url, prime_eligible, collected_at)
               VALUES ('B07W6JN8V8', 'Widget', 19.99, 29.99, 33.0, 4.5, 100, 500, 'DE',
                       'Electronics', 70.0, NULL, 1, 1000)"#
        )
        .execute(&db)
        .await
        .unwrap();

        let first = backfill_price_history_from_deals(&db).await.unwrap();
        let second = backfill_price_history_from_deals(&db).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);

        let count = sqlx::query_scalar!(
            "SELECT COUNT(*) FROM price_history WHERE watch_id = ?",
            id_str
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
