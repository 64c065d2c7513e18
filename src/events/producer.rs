use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{error, warn};

use crate::error::{AppError, Result};

/// Publishes to the two event-log topics (§4.4). `Send` blocks until the
/// broker acknowledges the write (at-least-once), but a failed send never
/// aborts the caller — the relational store is the source of truth, the
/// event log is a best-effort sink.
pub struct EventLogProducer {
    producer: FutureProducer,
}

impl EventLogProducer {
    pub fn new(brokers: &str) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| AppError::EventLogUnavailable(e.to_string()))?;
        Ok(Self { producer })
    }

    /// Sends a noop to validate broker connectivity at startup (§4.8 step 3).
    pub async fn ping(&self, topic: &str) -> Result<()> {
        self.send(topic, "__noop__", "{}").await
    }

    pub async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        match self.producer.send(record, Duration::from_secs(5)).await {
            Ok(_) => Ok(()),
            Err((e, _)) => {
                error!(topic, key, "event log publish failed: {e}");
                Err(AppError::EventLogUnavailable(e.to_string()))
            }
        }
    }

    /// Publish-and-log-only variant used by fan-out paths where a failed
    /// publish must not halt the rest of the pipeline (§4.7).
    pub async fn send_best_effort(&self, topic: &str, key: &str, payload: &str) {
        if let Err(e) = self.send(topic, key, payload).await {
            warn!("best-effort publish to {topic} dropped: {e}");
        }
    }
}
