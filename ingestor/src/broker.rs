use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use tracing::info;

use crate::errors::Result;
use crate::model::BrokerMessage;

/// Connection parameters for the consumer group subscription.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub client_id: String,
    pub timeout: Duration,
}

#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next message. Quiet topics block here indefinitely.
    async fn recv(&mut self) -> Result<BrokerMessage>;

    /// Marks `message` as processed so the next offset commit covers it.
    fn ack(&mut self, message: &BrokerMessage) -> Result<()>;

    fn close(&mut self);
}

/// Consumer group member with auto-commit of explicitly stored offsets.
///
/// Offsets are stored only through [`Subscription::ack`], so a message that
/// was received but never acked is delivered again after a restart.
pub struct KafkaSubscription {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl KafkaSubscription {
    /// One connection attempt: create the consumer, subscribe, and make sure
    /// the cluster answers a metadata request within `settings.timeout`.
    pub async fn connect(settings: &BrokerSettings) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("group.id", &settings.group_id)
            .set("client.id", &settings.client_id)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;
        let consumer = Arc::new(consumer);

        let client = Arc::clone(&consumer);
        let topic = settings.topic.clone();
        let timeout = settings.timeout;
        tokio::task::spawn_blocking(move || client.fetch_metadata(Some(topic.as_str()), timeout))
            .await??;

        consumer.subscribe(&[settings.topic.as_str()])?;
        info!(
            "Subscribed to {} as group {}",
            settings.topic, settings.group_id
        );

        Ok(Self {
            consumer,
            topic: settings.topic.clone(),
        })
    }
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn recv(&mut self) -> Result<BrokerMessage> {
        let message = self.consumer.recv().await?;

        Ok(BrokerMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec),
        })
    }

    fn ack(&mut self, message: &BrokerMessage) -> Result<()> {
        // The committed offset is the next one to read.
        self.consumer
            .store_offset(&message.topic, message.partition, message.offset + 1)?;
        Ok(())
    }

    fn close(&mut self) {
        info!("Closing subscription to {}", self.topic);
        self.consumer.unsubscribe();
    }
}
