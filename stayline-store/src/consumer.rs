use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use stayline_core::events::{EventHandler, HandlerOutcome};

use crate::events::EventProducer;

const RETRY_BACKOFF_BASE_MS: u64 = 200;
const RETRY_BACKOFF_CAP_MS: u64 = 10_000;

/// Exponential backoff for handler retries, capped.
pub fn retry_backoff(attempt: u32) -> Duration {
    let millis = RETRY_BACKOFF_BASE_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(RETRY_BACKOFF_CAP_MS);
    Duration::from_millis(millis)
}

/// Kafka consumer loop with manual commits.
///
/// The read position advances only after the handler settles a message:
/// `Ack` and `Drop` commit, `Retry` re-invokes the handler with backoff
/// up to `max_delivery_attempts` and then moves the payload to the
/// topic's `.dlq` sibling. Shutdown is observed only between messages, so
/// an in-flight handler always runs to completion and nothing
/// half-processed is ever committed.
pub struct EventConsumer {
    consumer: StreamConsumer,
    producer: EventProducer,
    topic: String,
    group_id: String,
    max_delivery_attempts: u32,
}

impl EventConsumer {
    pub fn new(
        brokers: &str,
        group_id: &str,
        topic: &str,
        producer: EventProducer,
        max_delivery_attempts: u32,
    ) -> Result<Self, rdkafka::error::KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(&[topic])?;

        Ok(Self {
            consumer,
            producer,
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            max_delivery_attempts,
        })
    }

    pub async fn run(&self, handler: Arc<dyn EventHandler>, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, group = %self.group_id, "consumer loop started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                result = self.consumer.recv() => match result {
                    Ok(message) => self.process(&message, handler.as_ref()).await,
                    Err(e) => {
                        error!(topic = %self.topic, error = %e, "consumer receive error");
                        sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!(topic = %self.topic, group = %self.group_id, "consumer loop stopped");
    }

    async fn process(&self, message: &BorrowedMessage<'_>, handler: &dyn EventHandler) {
        let payload = message.payload().unwrap_or_default();
        let mut attempt: u32 = 0;

        loop {
            match handler.handle(payload).await {
                HandlerOutcome::Ack => {
                    self.commit(message);
                    return;
                }
                HandlerOutcome::Drop => {
                    warn!(topic = %self.topic, "message dropped by handler");
                    self.commit(message);
                    return;
                }
                HandlerOutcome::Retry => {
                    attempt += 1;
                    if attempt >= self.max_delivery_attempts {
                        if self.dead_letter(message, payload).await {
                            self.commit(message);
                        }
                        // If dead-lettering failed the offset stays
                        // uncommitted and the message comes back after a
                        // restart or rebalance.
                        return;
                    }
                    sleep(retry_backoff(attempt)).await;
                }
            }
        }
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            error!(topic = %self.topic, error = %e, "failed to commit offset");
        }
    }

    async fn dead_letter(&self, message: &BorrowedMessage<'_>, payload: &[u8]) -> bool {
        let dlq_topic = format!("{}.dlq", self.topic);
        let key = message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default();

        match self.producer.publish(&dlq_topic, &key, payload).await {
            Ok(()) => {
                warn!(topic = %self.topic, dlq = %dlq_topic, key = %key, "message dead-lettered");
                true
            }
            Err(e) => {
                error!(topic = %self.topic, key = %key, error = %e, "failed to dead-letter message");
                false
            }
        }
    }
}
