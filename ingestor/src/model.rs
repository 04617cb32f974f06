use serde::Serialize;

/// A message detached from the consumer, so it can outlive the poll that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// Lifecycle of the ingestion worker, as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    ConnectingBroker,
    ConnectingStore,
    Running,
    Stopping,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub state: WorkerState,
}
