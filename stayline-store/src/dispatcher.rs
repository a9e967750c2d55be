use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use stayline_core::repository::StoreError;

use crate::events::EventProducer;
use crate::outbox::OutboxRepository;

const DISPATCH_BATCH: i64 = 100;

/// Drains the durable outbox into Kafka.
///
/// Rows are published in insertion order and a round stops at the first
/// failure, so events for one booking reach the broker in the order their
/// transitions committed. Failed rows accumulate attempts and are parked
/// dead after `max_attempts`, surfacing in logs for reconciliation.
pub struct OutboxDispatcher {
    outbox: OutboxRepository,
    producer: EventProducer,
    interval: Duration,
    max_attempts: i32,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: OutboxRepository,
        producer: EventProducer,
        interval: Duration,
        max_attempts: i32,
    ) -> Self {
        Self { outbox, producer, interval, max_attempts }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "outbox dispatcher started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = sleep(self.interval) => {
                    if let Err(e) = self.flush_once().await {
                        error!(error = %e, "outbox flush failed");
                    }
                }
            }
        }

        // Final drain attempt so a clean shutdown leaves as little queued
        // as the broker allows.
        if let Err(e) = self.flush_once().await {
            warn!(error = %e, "final outbox flush failed");
        }
        info!("outbox dispatcher stopped");
    }

    /// Publish pending rows; returns how many were dispatched.
    pub async fn flush_once(&self) -> Result<usize, StoreError> {
        let rows = self.outbox.pending(DISPATCH_BATCH).await?;
        let mut dispatched = 0;

        for row in rows {
            let payload = serde_json::to_vec(&row.payload)
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            match self.producer.publish(&row.topic, &row.partition_key, &payload).await {
                Ok(()) => {
                    self.outbox.mark_dispatched(row.id).await?;
                    dispatched += 1;
                }
                Err(e) => {
                    warn!(
                        outbox_id = row.id,
                        topic = %row.topic,
                        key = %row.partition_key,
                        attempts = row.attempts + 1,
                        error = %e,
                        "outbox publish failed, will retry"
                    );
                    let dead = self.outbox.record_failure(row.id, self.max_attempts).await?;
                    if dead {
                        error!(
                            outbox_id = row.id,
                            topic = %row.topic,
                            key = %row.partition_key,
                            "outbox row exhausted retries and was parked dead"
                        );
                    }
                    // Stop the round rather than publish later rows ahead
                    // of an earlier one for the same key.
                    break;
                }
            }
        }

        if dispatched > 0 {
            debug!(dispatched, "outbox rows dispatched");
        }
        Ok(dispatched)
    }
}
