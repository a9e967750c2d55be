use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error};

use stayline_core::events::BookingEvent;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The broker did not acknowledge within the deadline. The caller's
    /// local write has already committed; the event stays queued for
    /// retry instead of being discarded.
    #[error("event broker unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode event: {0}")]
    Encode(String),
}

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    ack_timeout: Duration,
}

impl EventProducer {
    pub fn new(brokers: &str, ack_timeout: Duration) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", ack_timeout.as_millis().to_string())
            .create()?;

        Ok(Self { producer, ack_timeout })
    }

    /// Publish one keyed message and wait for broker acknowledgment.
    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(), PublishError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(self.ack_timeout)).await {
            Ok(delivery) => {
                let (partition, offset) = (delivery.partition, delivery.offset);
                debug!(topic, key, partition, offset, "event published");
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic, key, error = %e, "failed to publish event");
                Err(PublishError::Unavailable(e.to_string()))
            }
        }
    }

    /// Serialize a booking event and publish it under its partition key.
    pub async fn publish_event(
        &self,
        topic: &str,
        event: &BookingEvent,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event).map_err(|e| PublishError::Encode(e.to_string()))?;
        self.publish(topic, &event.key(), &payload).await
    }
}
