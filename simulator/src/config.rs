use std::time::Duration;

use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use common::RetryPolicy;

#[derive(Debug, Parser)]
#[command(version, about = "Publishes synthetic shipment sensor readings to Kafka")]
pub struct Args {
    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BROKER", value_parser = NonEmptyStringValueParser::new())]
    pub brokers: String,

    /// Topic the readings are published to
    #[arg(long, env = "KAFKA_TOPIC", value_parser = NonEmptyStringValueParser::new())]
    pub topic: String,

    /// Pause between two readings
    #[arg(long, env = "SEND_INTERVAL_SECS", default_value_t = 10)]
    pub interval_secs: u64,

    #[arg(
        long,
        env = "CONNECT_MAX_ATTEMPTS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub connect_attempts: u32,

    #[arg(long, env = "CONNECT_BACKOFF_SECS", default_value_t = 5)]
    pub connect_backoff_secs: u64,

    /// How long shutdown waits for queued readings to be acknowledged
    #[arg(long, env = "FLUSH_TIMEOUT_SECS", default_value_t = 30)]
    pub flush_timeout_secs: u64,
}

impl Args {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connect_attempts,
            Duration::from_secs(self.connect_backoff_secs),
        )
    }
}
