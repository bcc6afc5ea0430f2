use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use riptide_core::{EventPublisher, PublishError};
use riptide_shared::BookingEvent;
use std::time::Duration;
use tracing::{error, info};

/// Kafka-backed publisher. Events are keyed by booking id so every change to
/// one booking lands on the same partition.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, event: &BookingEvent) -> Result<(), PublishError> {
        let topic = event.topic();
        let key = event.booking_id().to_string();
        let payload = serde_json::to_string(event).map_err(|e| PublishError {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

        let record = FutureRecord::to(topic).key(&key).payload(&payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(PublishError {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
