use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::config::{consumer_groups, topics, CONSUMER_ERROR_BACKOFF_SECS, TARGET_TOLERANCE};
use crate::error::{AppError, Result};
use crate::types::{now_unix_secs, PriceUpdateEvent, WatchId};

/// Reads `price-updates` as the `keeper-consumer-group` cohort (§4.5).
/// Uses automatic periodic cursor commit: at-least-once delivery is
/// acceptable because both downstream writes are idempotent under their
/// natural keys.
pub struct PriceConsumer {
    consumer: StreamConsumer,
    pool: SqlitePool,
}

impl PriceConsumer {
    pub fn new(brokers: &str, pool: SqlitePool) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", consumer_groups::PRICE)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| AppError::EventLogUnavailable(e.to_string()))?;

        consumer
            .subscribe(&[topics::PRICE_UPDATES])
            .map_err(|e| AppError::EventLogUnavailable(e.to_string()))?;

        Ok(Self { consumer, pool })
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut stream = self.consumer.stream();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("price consumer shutting down");
                        break;
                    }
                }
                maybe = stream.next() => {
                    let Some(msg) = maybe else { break };
                    match msg {
                        Ok(m) => {
                            if let Some(payload) = m.payload() {
                                if let Err(e) = self.handle_payload(payload).await {
                                    warn!("price consumer message error: {e}");
                                }
                            }
                            if let Err(e) = self.consumer.commit_message(&m, CommitMode::Async) {
                                warn!("price consumer commit failed: {e}");
                            }
                        }
                        Err(e) => {
                            error!("price consumer stream error: {e}, backing off");
                            tokio::time::sleep(std::time::Duration::from_secs(CONSUMER_ERROR_BACKOFF_SECS)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_payload(&self, payload: &[u8]) -> Result<()> {
        let event: PriceUpdateEvent = serde_json::from_slice(payload)
            .map_err(|e| AppError::InvalidResponse(format!("price-updates payload: {e}")))?;

        let watch = sqlx::query_scalar!(
            "SELECT id FROM watched_products WHERE product_code = ? AND status != 'INACTIVE'",
            event.product_code,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(watch_id_str) = watch else {
            return Ok(());
        };
        let watch_id = WatchId(uuid::Uuid::parse_str(&watch_id_str).unwrap_or_default());

        let recorded_at = now_unix_secs();
        sqlx::query!(
            r#"INSERT INTO price_history (watch_id, price, source, recorded_at) VALUES (?, ?, 'kafka', ?)"#,
            watch_id_str,
            event.current_price,
            recorded_at,
        )
        .execute(&self.pool)
        .await?;

        let crossed = event.current_price <= event.target_price * TARGET_TOLERANCE;
        if !crossed {
            return Ok(());
        }

        let since = now_unix_secs() - 3_600;
        let recent = crate::db::alerts::recent_alerts_for_watch(&self.pool, watch_id, since).await?;
        let already_alerted = recent
            .iter()
            .any(|a| a.status == "PENDING" || a.status == "SENT");
        if already_alerted {
            return Ok(());
        }

        crate::db::alerts::create_price_alert(
            &self.pool,
            watch_id,
            event.current_price,
            event.target_price,
            event.previous_price,
            event.current_price,
        )
        .await?;

        Ok(())
    }
}
