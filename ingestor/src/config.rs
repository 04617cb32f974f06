use std::time::Duration;

use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use common::RetryPolicy;

use crate::broker::BrokerSettings;
use crate::store::StoreSettings;
use crate::supervisor::SupervisorOptions;

#[derive(Debug, Parser)]
#[command(version, about = "Relays sensor readings from a Kafka topic into MongoDB")]
pub struct Args {
    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS", value_parser = NonEmptyStringValueParser::new())]
    pub brokers: String,

    #[arg(long, env = "KAFKA_TOPIC", value_parser = NonEmptyStringValueParser::new())]
    pub topic: String,

    /// Consumer group whose committed offsets the worker resumes from
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "consumer_group_1")]
    pub group_id: String,

    #[arg(long, env = "MONGO_URI", value_parser = NonEmptyStringValueParser::new())]
    pub mongo_uri: String,

    #[arg(long, env = "MONGO_DB", default_value = "scmlitedb")]
    pub mongo_db: String,

    #[arg(long, env = "MONGO_COLLECTION", default_value = "shipment_data")]
    pub mongo_collection: String,

    #[arg(
        long,
        env = "CONNECT_MAX_ATTEMPTS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub connect_attempts: u32,

    #[arg(long, env = "CONNECT_BACKOFF_SECS", default_value_t = 5)]
    pub connect_backoff_secs: u64,

    /// Timeout of a single connection attempt
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Pause before the worker is restarted after a crash
    #[arg(long, env = "RESTART_DELAY_SECS", default_value_t = 5)]
    pub restart_delay_secs: u64,

    /// Delete every document in the collection before consuming (destructive)
    #[arg(long, env = "RESET_COLLECTION")]
    pub reset_collection: bool,

    /// Address for /metrics and /health; disabled when unset
    #[arg(long, env = "HTTP_ADDR")]
    pub http_addr: Option<String>,
}

impl Args {
    pub fn broker_settings(&self, client_id: String) -> BrokerSettings {
        BrokerSettings {
            brokers: self.brokers.clone(),
            topic: self.topic.clone(),
            group_id: self.group_id.clone(),
            client_id,
            timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            uri: self.mongo_uri.clone(),
            database: self.mongo_db.clone(),
            collection: self.mongo_collection.clone(),
            timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            retry: RetryPolicy::new(
                self.connect_attempts,
                Duration::from_secs(self.connect_backoff_secs),
            ),
            restart_delay: Duration::from_secs(self.restart_delay_secs),
            reset_collection: self.reset_collection,
        }
    }
}
