use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::{now_unix_secs, CollectedDeal};

use super::{models::CollectedDealRow, watches};

/// Composes `EnsureTrackedProduct` + a PriceHistory insert + the watch-level
/// price update in one call (§4.3, §4.7 step 1-2).
pub async fn record_deal_price(
    pool: &SqlitePool,
    product_code: &str,
    price: f64,
    title: &str,
    source: &str,
) -> Result<()> {
    let watch_id = watches::ensure_tracked_product(pool, product_code, title, Some(price)).await?;
    watches::update_watch_price(pool, watch_id, price, Some(source)).await?;
    Ok(())
}

/// Single-transaction bulk insert of collector output (§4.3).
pub async fn save_collected_deals_batch(pool: &SqlitePool, deals: &[CollectedDeal]) -> Result<u64> {
    if deals.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut count = 0u64;

    for deal in deals {
        let prime_eligible = i64::from(deal.prime_eligible);
        sqlx::query!(
            r#"
            INSERT INTO collected_deals
                (product_code, title, current_price, original_price, discount_percent,
                 rating, review_count, sales_rank, market_domain, category, deal_score,
                 url, prime_eligible, collected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            deal.product_code,
            deal.title,
            deal.current_price,
            deal.original_price,
            deal.discount_percent,
            deal.rating,
            deal.review_count,
            deal.sales_rank,
            deal.market_domain,
            deal.category,
            deal.deal_score,
            deal.url,
            prime_eligible,
            deal.collected_at,
        )
        .execute(&mut *tx)
        .await?;
        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}

pub async fn recent_deals(pool: &SqlitePool, since: i64, limit: i64) -> Result<Vec<CollectedDeal>> {
    let rows = sqlx::query_as!(
        CollectedDealRow,
        r#"
        SELECT id, product_code, title, current_price, original_price, discount_percent,
               rating, review_count, sales_rank, market_domain, category, deal_score,
               url, prime_eligible, collected_at
        FROM collected_deals
        WHERE collected_at >= ?
        ORDER BY deal_score DESC
        LIMIT ?
        "#,
        since,
        limit,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub fn now() -> i64 {
    now_unix_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{pool, users};

    fn sample_deal(code: &str) -> CollectedDeal {
        CollectedDeal {
            product_code: code.to_string(),
            title: "Widget".to_string(),
            current_price: 19.99,
            original_price: Some(29.99),
            discount_percent: Some(33.0),
            rating: Some(4.5),
            review_count: Some(120),
            sales_rank: Some(400),
            market_domain: "DE".to_string(),
            category: Some("Electronics".to_string()),
            deal_score: 70.0,
            url: None,
            prime_eligible: true,
            collected_at: now_unix_secs(),
        }
    }

    #[tokio::test]
    async fn save_collected_deals_batch_is_single_transaction() {
        let db = pool::init("sqlite::memory:").await.unwrap();
        let deals = vec![sample_deal("B07W6JN8V8"), sample_deal("B08XYZZZZZ")];
        let count = save_collected_deals_batch(&db, &deals).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn record_deal_price_creates_system_owned_watch() {
        let db = pool::init("sqlite::memory:").await.unwrap();
        users::ensure_system_user(&db).await.unwrap();
        record_deal_price(&db, "B07W6JN8V8", 19.99, "Widget", "kafka_deals")
            .await
            .unwrap();

        let watches = crate::db::watches::get_active_watches(&db).await.unwrap();
        assert_eq!(watches.len(), 1);
        assert_eq!(watches[0].current_price, Some(19.99));
    }
}
