use std::time::Duration;

use async_trait::async_trait;
use common::RetryPolicy;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broker::{BrokerSettings, KafkaSubscription, Subscription};
use crate::errors::{Error, Result};
use crate::metrics::{CONNECT_FAILURES_TOTAL, RESTARTS_TOTAL};
use crate::model::WorkerState;
use crate::store::{DocumentStore, MongoStore, StoreSettings};
use crate::worker::Worker;

/// Opens the two connections the worker needs. Each call is a single attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    type Subscription: Subscription;
    type Store: DocumentStore;

    async fn subscribe(&self) -> Result<Self::Subscription>;

    async fn open_store(&self) -> Result<Self::Store>;
}

pub struct KafkaMongoConnector {
    broker: BrokerSettings,
    store: StoreSettings,
}

impl KafkaMongoConnector {
    pub fn new(broker: BrokerSettings, store: StoreSettings) -> Self {
        Self { broker, store }
    }
}

#[async_trait]
impl Connector for KafkaMongoConnector {
    type Subscription = KafkaSubscription;
    type Store = MongoStore;

    async fn subscribe(&self) -> Result<KafkaSubscription> {
        KafkaSubscription::connect(&self.broker).await
    }

    async fn open_store(&self) -> Result<MongoStore> {
        MongoStore::connect(&self.store).await
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub retry: RetryPolicy,
    pub restart_delay: Duration,
    /// Wipe the collection once before the first run.
    pub reset_collection: bool,
}

/// Runs the worker until shutdown, restarting it from scratch after a crash.
///
/// Returns `Ok` on cancellation and an error only when a connection could
/// not be established within the retry bound.
pub async fn run<C: Connector>(
    connector: &C,
    options: &SupervisorOptions,
    state: &watch::Sender<WorkerState>,
    ct: &CancellationToken,
) -> Result<()> {
    let mut reset_pending = options.reset_collection;

    loop {
        match run_once(connector, options, &mut reset_pending, state, ct).await {
            Ok(()) | Err(Error::Cancelled) => {
                state.send_replace(WorkerState::Stopping);
                return Ok(());
            }
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                return Err(e);
            }
            Err(e) => {
                RESTARTS_TOTAL.inc();
                state.send_replace(WorkerState::ConnectingBroker);
                error!("Consumer crashed ({:?}): {}", e.kind(), e);
                info!("Restarting in {:?}...", options.restart_delay);

                tokio::select! {
                    _ = ct.cancelled() => {
                        state.send_replace(WorkerState::Stopping);
                        return Ok(());
                    }
                    _ = tokio::time::sleep(options.restart_delay) => {}
                }
            }
        }
    }
}

async fn run_once<C: Connector>(
    connector: &C,
    options: &SupervisorOptions,
    reset_pending: &mut bool,
    state: &watch::Sender<WorkerState>,
    ct: &CancellationToken,
) -> Result<()> {
    state.send_replace(WorkerState::ConnectingBroker);
    let mut subscription = options
        .retry
        .retry("Kafka", ct, move |_| async move {
            let result = connector.subscribe().await;
            if result.is_err() {
                CONNECT_FAILURES_TOTAL.with_label_values(&["kafka"]).inc();
            }
            result
        })
        .await
        .map_err(|e| Error::from_retry("Kafka", e))?;
    info!("Connected to Kafka");

    state.send_replace(WorkerState::ConnectingStore);
    let store = match options
        .retry
        .retry("MongoDB", ct, move |_| async move {
            let result = connector.open_store().await;
            if result.is_err() {
                CONNECT_FAILURES_TOTAL.with_label_values(&["mongodb"]).inc();
            }
            result
        })
        .await
    {
        Ok(store) => store,
        Err(e) => {
            subscription.close();
            return Err(Error::from_retry("MongoDB", e));
        }
    };
    info!("Connected to MongoDB");

    if *reset_pending {
        match store.clear().await {
            Ok(deleted) => {
                warn!("Reset requested: deleted {} existing documents", deleted);
                *reset_pending = false;
            }
            Err(e) => {
                subscription.close();
                return Err(e);
            }
        }
    }

    state.send_replace(WorkerState::Running);
    let mut worker = Worker::new(subscription, store);
    let result = worker.run(ct).await;
    if result.is_ok() {
        state.send_replace(WorkerState::Stopping);
    }
    worker.close();
    result
}
