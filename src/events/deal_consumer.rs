use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::config::{consumer_groups, topics, CONSUMER_ERROR_BACKOFF_SECS};
use crate::error::{AppError, Result};
use crate::types::DealUpdateEvent;

/// Reads `deal-updates` as the `keeper-consumer-group-deals` cohort (§4.5).
pub struct DealConsumer {
    consumer: StreamConsumer,
    pool: SqlitePool,
}

impl DealConsumer {
    pub fn new(brokers: &str, pool: SqlitePool) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", consumer_groups::DEALS)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| AppError::EventLogUnavailable(e.to_string()))?;

        consumer
            .subscribe(&[topics::DEAL_UPDATES])
            .map_err(|e| AppError::EventLogUnavailable(e.to_string()))?;

        Ok(Self { consumer, pool })
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut stream = self.consumer.stream();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("deal consumer shutting down");
                        break;
                    }
                }
                maybe = stream.next() => {
                    let Some(msg) = maybe else { break };
                    match msg {
                        Ok(m) => {
                            if let Some(payload) = m.payload() {
                                if let Err(e) = self.handle_payload(payload).await {
                                    warn!("deal consumer message error: {e}");
                                }
                            }
                            if let Err(e) = self.consumer.commit_message(&m, CommitMode::Async) {
                                warn!("deal consumer commit failed: {e}");
                            }
                        }
                        Err(e) => {
                            error!("deal consumer stream error: {e}, backing off");
                            tokio::time::sleep(std::time::Duration::from_secs(CONSUMER_ERROR_BACKOFF_SECS)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_payload(&self, payload: &[u8]) -> Result<()> {
        let event: DealUpdateEvent = serde_json::from_slice(payload)
            .map_err(|e| AppError::InvalidResponse(format!("deal-updates payload: {e}")))?;

        crate::db::watches::ensure_tracked_product(
            &self.pool,
            &event.product_code,
            &event.product_title,
            Some(event.current_price),
        )
        .await?;

        crate::db::deals::record_deal_price(
            &self.pool,
            &event.product_code,
            event.current_price,
            &event.product_title,
            "kafka_deals",
        )
        .await?;

        Ok(())
    }
}
