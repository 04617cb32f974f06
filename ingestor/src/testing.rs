//! In-memory broker and store used by the worker and supervisor tests.

use std::future::pending;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::Document;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use tokio_util::sync::CancellationToken;

use crate::broker::Subscription;
use crate::errors::{Error, Result};
use crate::model::BrokerMessage;
use crate::store::DocumentStore;
use crate::supervisor::Connector;

pub const TOPIC: &str = "shipment_data";

/// Single-partition log with one consumer group's committed offset.
#[derive(Clone, Default)]
pub struct FakeBroker {
    log: Arc<Mutex<Vec<Option<Vec<u8>>>>>,
    committed: Arc<Mutex<i64>>,
    failing_recvs: Arc<AtomicU32>,
    fail_at_offset: Arc<Mutex<Option<i64>>>,
    closed: Arc<AtomicU32>,
    cancel_when_drained: Arc<Mutex<Option<CancellationToken>>>,
}

impl FakeBroker {
    pub fn publish(&self, payload: &[u8]) {
        self.log.lock().unwrap().push(Some(payload.to_vec()));
    }

    pub fn publish_tombstone(&self) {
        self.log.lock().unwrap().push(None);
    }

    /// Cancels `ct` once a subscription has read past the end of the log.
    pub fn cancel_when_drained(&self, ct: &CancellationToken) {
        *self.cancel_when_drained.lock().unwrap() = Some(ct.clone());
    }

    /// The next `n` receives fail with a transport error.
    pub fn fail_next_recvs(&self, n: u32) {
        self.failing_recvs.store(n, Ordering::SeqCst);
    }

    /// The first receive that reaches `offset` fails once with a transport error.
    pub fn fail_at_offset(&self, offset: i64) {
        *self.fail_at_offset.lock().unwrap() = Some(offset);
    }

    pub fn committed(&self) -> i64 {
        *self.committed.lock().unwrap()
    }

    pub fn closed_count(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    /// Joins the group, resuming from the committed offset.
    pub fn subscribe(&self) -> FakeSubscription {
        FakeSubscription {
            position: self.committed(),
            broker: self.clone(),
        }
    }
}

fn transport_failure() -> Error {
    Error::Broker(KafkaError::MessageConsumption(
        RDKafkaErrorCode::BrokerTransportFailure,
    ))
}

pub struct FakeSubscription {
    broker: FakeBroker,
    position: i64,
}

#[async_trait]
impl Subscription for FakeSubscription {
    async fn recv(&mut self) -> Result<BrokerMessage> {
        let failing = &self.broker.failing_recvs;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(transport_failure());
        }

        {
            let mut fail_at = self.broker.fail_at_offset.lock().unwrap();
            if *fail_at == Some(self.position) {
                *fail_at = None;
                return Err(transport_failure());
            }
        }

        let next = self
            .broker
            .log
            .lock()
            .unwrap()
            .get(self.position as usize)
            .cloned();

        match next {
            Some(payload) => {
                let message = BrokerMessage {
                    topic: TOPIC.to_string(),
                    partition: 0,
                    offset: self.position,
                    payload,
                };
                self.position += 1;
                Ok(message)
            }
            None => {
                let token = self.broker.cancel_when_drained.lock().unwrap().clone();
                if let Some(token) = token {
                    token.cancel();
                }
                pending().await
            }
        }
    }

    fn ack(&mut self, message: &BrokerMessage) -> Result<()> {
        let mut committed = self.broker.committed.lock().unwrap();
        *committed = (*committed).max(message.offset + 1);
        Ok(())
    }

    fn close(&mut self) {
        self.broker.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct FakeStore {
    documents: Arc<Mutex<Vec<Document>>>,
    failing_inserts: Arc<AtomicU32>,
    hang_after_next_insert: Arc<AtomicBool>,
}

impl FakeStore {
    pub fn documents(&self) -> Vec<Document> {
        self.documents.lock().unwrap().clone()
    }

    pub fn seed(&self, document: Document) {
        self.documents.lock().unwrap().push(document);
    }

    /// The next `n` inserts fail with a write error.
    pub fn fail_next_inserts(&self, n: u32) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// The next insert is written but never returns, like a process killed
    /// between the write and the offset commit.
    pub fn hang_after_next_insert(&self) {
        self.hang_after_next_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn insert(&self, document: Document) -> Result<String> {
        if self
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::StoreWrite(mongodb::error::Error::custom(
                "connection reset by peer",
            )));
        }

        let id = {
            let mut documents = self.documents.lock().unwrap();
            documents.push(document);
            documents.len().to_string()
        };

        if self.hang_after_next_insert.swap(false, Ordering::SeqCst) {
            pending::<()>().await;
        }
        Ok(id)
    }

    async fn clear(&self) -> Result<u64> {
        let mut documents = self.documents.lock().unwrap();
        let count = documents.len() as u64;
        documents.clear();
        Ok(count)
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub broker: FakeBroker,
    pub store: FakeStore,
    pub broker_failures: AtomicU32,
    pub store_failures: AtomicU32,
    pub subscribe_attempts: AtomicU32,
    pub store_attempts: AtomicU32,
}

#[async_trait]
impl Connector for FakeConnector {
    type Subscription = FakeSubscription;
    type Store = FakeStore;

    async fn subscribe(&self) -> Result<FakeSubscription> {
        self.subscribe_attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .broker_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Broker(KafkaError::MetadataFetch(
                RDKafkaErrorCode::AllBrokersDown,
            )));
        }
        Ok(self.broker.subscribe())
    }

    async fn open_store(&self) -> Result<FakeStore> {
        self.store_attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .store_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::StoreConnect(mongodb::error::Error::custom(
                "server selection timeout",
            )));
        }
        Ok(self.store.clone())
    }
}
