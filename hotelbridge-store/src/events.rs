use async_trait::async_trait;
use hotelbridge_core::notification::Notifier;
use hotelbridge_core::{BookingError, BookingResult};
use hotelbridge_shared::models::BookingNotification;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

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

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Publishes notifications to `<topic>.<kind>` for the messaging service to deliver.
pub struct KafkaNotifier {
    producer: EventProducer,
    topic: String,
}

impl KafkaNotifier {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self { producer, topic: topic.into() }
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn notify(&self, notification: &BookingNotification) -> BookingResult<()> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| BookingError::Internal(e.to_string()))?;
        let topic = format!("{}.{}", self.topic, notification.kind.topic_suffix());

        self.producer
            .publish(&topic, &notification.transaction_id.to_string(), &payload)
            .await
            .map_err(|e| BookingError::Internal(format!("Notification publish failed: {}", e)))
    }
}

/// Development notifier: writes the event to the log instead of messaging a guest.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &BookingNotification) -> BookingResult<()> {
        info!(
            transaction_id = %notification.transaction_id,
            kind = ?notification.kind,
            email = ?notification.email,
            "Notification (log backend)"
        );
        Ok(())
    }
}
