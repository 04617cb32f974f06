use common::RetryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Could not connect to Kafka after {attempts} attempts: {last}")]
    ConnectExhausted { attempts: u32, last: Box<Error> },

    #[error("Shutdown requested")]
    Cancelled,
}

impl From<RetryError<Error>> for Error {
    fn from(err: RetryError<Error>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => Error::ConnectExhausted {
                attempts,
                last: Box::new(last),
            },
            RetryError::Cancelled => Error::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
