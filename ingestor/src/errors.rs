use common::RetryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    #[error("MongoDB connection error: {0}")]
    StoreConnect(mongodb::error::Error),

    #[error("MongoDB write error: {0}")]
    StoreWrite(mongodb::error::Error),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON conversion error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Could not connect to {target} after {attempts} attempts: {last}")]
    ConnectExhausted {
        target: &'static str,
        attempts: u32,
        last: Box<Error>,
    },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown requested")]
    Cancelled,
}

/// How the supervisor and the receive loop treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broker or store unreachable. Retried with backoff.
    Connectivity,
    /// Bad message payload. Logged and skipped.
    Deserialization,
    /// Insert failed on an open connection. Logged, the message counts as processed.
    StoreWrite,
    /// Anything else. The supervisor restarts the worker.
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Broker(_) | Error::StoreConnect(_) | Error::ConnectExhausted { .. } => {
                ErrorKind::Connectivity
            }
            Error::Malformed(_) | Error::Json(_) | Error::Bson(_) => ErrorKind::Deserialization,
            Error::StoreWrite(_) => ErrorKind::StoreWrite,
            Error::Task(_) | Error::Io(_) | Error::Cancelled => ErrorKind::Unexpected,
        }
    }

    /// Errors that end the process instead of restarting the worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConnectExhausted { .. })
    }

    pub fn from_retry(target: &'static str, err: RetryError<Error>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => Error::ConnectExhausted {
                target,
                attempts,
                last: Box::new(last),
            },
            RetryError::Cancelled => Error::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
