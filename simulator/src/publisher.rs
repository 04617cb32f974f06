use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use common::RetryPolicy;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{Error, Result};
use crate::telemetry::Reading;

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a reading landed once the broker acknowledged it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// Resolves once the broker acknowledges (or rejects) a queued reading.
pub type PendingDelivery = Pin<Box<dyn Future<Output = Result<Delivery>> + Send>>;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Queues `reading` without waiting for the broker.
    fn publish(&self, reading: &Reading) -> Result<PendingDelivery>;

    /// Waits for every queued message to be acknowledged.
    async fn flush(&self, timeout: Duration) -> Result<()>;
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaPublisher {
    /// Creates the producer and waits until the cluster answers a metadata request.
    pub async fn connect(
        brokers: &str,
        topic: &str,
        client_id: &str,
        policy: &RetryPolicy,
        ct: &CancellationToken,
    ) -> Result<Self> {
        info!("Connecting to Kafka at {}", brokers);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", client_id)
            .set("request.timeout.ms", "20000")
            .set("message.timeout.ms", "30000")
            .create()?;

        policy
            .retry("Kafka", ct, |_| {
                let producer = producer.clone();
                let topic = topic.to_string();
                async move {
                    tokio::task::spawn_blocking(move || {
                        producer
                            .client()
                            .fetch_metadata(Some(topic.as_str()), METADATA_TIMEOUT)
                            .map(|_| ())
                    })
                    .await??;
                    Ok::<_, Error>(())
                }
            })
            .await?;

        info!("Producer connected to Kafka at {}", brokers);

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    fn publish(&self, reading: &Reading) -> Result<PendingDelivery> {
        let payload = serde_json::to_string(reading)?;
        let record = FutureRecord::to(&self.topic)
            .key(&reading.device_id)
            .payload(&payload);

        let delivery = self.producer.send_result(record).map_err(|(e, _)| e)?;

        Ok(Box::pin(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => Ok(Delivery { partition, offset }),
                Ok(Err((e, _))) => Err(Error::Kafka(e)),
                // The producer was dropped before reporting.
                Err(_) => Err(Error::Kafka(KafkaError::Canceled)),
            }
        }))
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(timeout)).await??;
        Ok(())
    }
}
