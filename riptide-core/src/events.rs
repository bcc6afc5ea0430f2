use async_trait::async_trait;
use riptide_shared::BookingEvent;
use tracing::info;

#[derive(Debug, thiserror::Error)]
#[error("Failed to publish to {topic}: {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

/// Sink for committed booking events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> Result<(), PublishError>;
}

/// Publisher that only records events in the trace log.
///
/// Used when no message broker is configured.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &BookingEvent) -> Result<(), PublishError> {
        info!(topic = event.topic(), booking_id = %event.booking_id(), "booking event");
        Ok(())
    }
}
