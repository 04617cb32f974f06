//! Helpers shared by the telemetry simulator and the ingestor: bounded
//! connection retries, signal driven shutdown and log initialisation.

pub mod logging;
pub mod retry;
pub mod shutdown;

pub use retry::{RetryError, RetryPolicy};
