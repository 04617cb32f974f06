use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::Subscription;
use crate::decode::{decode, preview, Decoded};
use crate::errors::Result;
use crate::metrics::{
    EMPTY_MESSAGES_TOTAL, INSERTED_TOTAL, INSERT_LATENCY_SECONDS, MALFORMED_MESSAGES_TOTAL,
    MESSAGES_TOTAL, STORE_FAILURES_TOTAL,
};
use crate::model::BrokerMessage;
use crate::store::DocumentStore;

/// What happened to a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted(String),
    Empty,
    Malformed,
    /// The insert failed; the reading is lost once its offset is committed.
    StoreFailed,
}

/// Moves messages from one subscription into one store, strictly in order.
pub struct Worker<S, D> {
    subscription: S,
    store: D,
}

impl<S, D> Worker<S, D>
where
    S: Subscription,
    D: DocumentStore,
{
    pub fn new(subscription: S, store: D) -> Self {
        Self {
            subscription,
            store,
        }
    }

    /// Receives and processes messages until `ct` is cancelled.
    ///
    /// Bad payloads and failed inserts never end the loop. Errors from the
    /// subscription itself are returned for the supervisor to handle.
    pub async fn run(&mut self, ct: &CancellationToken) -> Result<()> {
        info!("Consumer started. Listening for messages...");

        loop {
            let message = tokio::select! {
                biased;
                _ = ct.cancelled() => {
                    info!("Stopping consumer...");
                    return Ok(());
                }
                message = self.subscription.recv() => message?,
            };

            self.process(&message).await;

            if let Err(e) = self.subscription.ack(&message) {
                warn!(
                    "Failed to store offset {} for partition {}: {}",
                    message.offset, message.partition, e
                );
            }
        }
    }

    pub async fn process(&self, message: &BrokerMessage) -> Outcome {
        MESSAGES_TOTAL.inc();

        let document = match decode(message.payload.as_deref()) {
            Ok(Decoded::Document(document)) => document,
            Ok(Decoded::Empty) => {
                EMPTY_MESSAGES_TOTAL.inc();
                warn!(
                    "Empty message received (partition {}, offset {})",
                    message.partition, message.offset
                );
                return Outcome::Empty;
            }
            Err(e) => {
                MALFORMED_MESSAGES_TOTAL.inc();
                warn!(
                    "Invalid message (partition {}, offset {}): {}. Payload: {}",
                    message.partition,
                    message.offset,
                    e,
                    preview(message.payload.as_deref())
                );
                return Outcome::Malformed;
            }
        };

        let _timer = INSERT_LATENCY_SECONDS.start_timer();
        match self.store.insert(document).await {
            Ok(id) => {
                INSERTED_TOTAL.inc();
                debug!("Inserted document ID: {}", id);
                Outcome::Inserted(id)
            }
            Err(e) => {
                STORE_FAILURES_TOTAL.inc();
                error!(
                    "MongoDB insert failed, dropping message (partition {}, offset {}): {}",
                    message.partition, message.offset, e
                );
                Outcome::StoreFailed
            }
        }
    }

    pub fn close(&mut self) {
        self.subscription.close();
    }
}
