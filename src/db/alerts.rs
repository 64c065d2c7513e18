use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{now_unix_secs, AlertStatus, WatchId};

use super::models::PriceAlertRow;

/// Inserts a PENDING alert row (§4.3). Called by the price-check pipeline
/// when a watch's current price crosses its target.
pub async fn create_price_alert(
    pool: &SqlitePool,
    watch_id: WatchId,
    triggered_price: f64,
    target_price: f64,
    old_price: Option<f64>,
    new_price: f64,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let watch_str = watch_id.0.to_string();
    let now = now_unix_secs();
    let status = AlertStatus::Pending.to_string();
    let discount_percent = old_price.map(|old| {
        if old > 0.0 {
            ((old - new_price) / old) * 100.0
        } else {
            0.0
        }
    });

    sqlx::query!(
        r#"
        INSERT INTO price_alerts
            (id, watch_id, triggered_price, target_price, old_price, new_price,
             discount_percent, status, notification_channel, triggered_at, sent_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, NULL)
        "#,
        id,
        watch_str,
        triggered_price,
        target_price,
        old_price,
        new_price,
        discount_percent,
        status,
        now,
    )
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn mark_sent(pool: &SqlitePool, alert_id: &str, channel: &str) -> Result<()> {
    let status = AlertStatus::Sent.to_string();
    let now = now_unix_secs();
    sqlx::query!(
        "UPDATE price_alerts SET status = ?, notification_channel = ?, sent_at = ? WHERE id = ?",
        status,
        channel,
        now,
        alert_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, alert_id: &str) -> Result<()> {
    let status = AlertStatus::Failed.to_string();
    sqlx::query!(
        "UPDATE price_alerts SET status = ? WHERE id = ?",
        status,
        alert_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Alerts raised for a watch in the last `window_secs` seconds, used for
/// dedup-window checks (§4.9).
pub async fn recent_alerts_for_watch(
    pool: &SqlitePool,
    watch_id: WatchId,
    since: i64,
) -> Result<Vec<PriceAlertRow>> {
    let watch_str = watch_id.0.to_string();
    let rows = sqlx::query_as!(
        PriceAlertRow,
        r#"
        SELECT id, watch_id, triggered_price, target_price, old_price, new_price,
               discount_percent, status, notification_channel, triggered_at, sent_at
        FROM price_alerts
        WHERE watch_id = ? AND triggered_at >= ?
        ORDER BY triggered_at DESC
        "#,
        watch_str,
        since,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{pool, users, watches};

    #[tokio::test]
    async fn create_then_mark_sent_round_trips() {
        let db = pool::init("sqlite::memory:").await.unwrap();
        users::ensure_system_user(&db).await.unwrap();
        let watch = watches::create_watch(
            &db,
            crate::types::SYSTEM_USER_ID,
            "B07W6JN8V8",
            "Widget",
            45.0,
        )
        .await
        .unwrap();

        let alert_id = create_price_alert(&db, watch, 44.99, 45.0, Some(55.0), 44.99)
            .await
            .unwrap();
        mark_sent(&db, &alert_id, "email").await.unwrap();

        let recent = recent_alerts_for_watch(&db, watch, 0).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, "SENT");
    }

    #[tokio::test]
    async fn discount_percent_computed_from_old_price() {
        let db = pool::init("sqlite::memory:").await.unwrap();
        users::ensure_system_user(&db).await.unwrap();
        let watch = watches::create_watch(
            &db,
            crate::types::SYSTEM_USER_ID,
            "B07W6JN8V8",
            "Widget",
            45.0,
        )
        .await
        .unwrap();

        let alert_id = create_price_alert(&db, watch, 50.0, 45.0, Some(100.0), 50.0)
            .await
            .unwrap();
        let recent = recent_alerts_for_watch(&db, watch, 0).await.unwrap();
        let alert = recent.iter().find(|a| a.id == alert_id).unwrap();
        assert_eq!(alert.discount_percent, Some(50.0));
    }
}
