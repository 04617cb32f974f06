mod config;
mod errors;
mod producer;
mod publisher;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;
use config::Args;
use errors::Error;
use publisher::KafkaPublisher;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use telemetry::ReadingGenerator;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    common::logging::init();

    info!("Starting telemetry simulator");
    info!(
        "Broker: {}, topic: {}, interval: {}s",
        args.brokers, args.topic, args.interval_secs
    );

    let ct = CancellationToken::new();
    common::shutdown::listen(ct.clone());

    let mut rng = StdRng::from_entropy();
    let client_id = format!("sim-{}", rng.gen::<u32>());

    let publisher = match KafkaPublisher::connect(
        &args.brokers,
        &args.topic,
        &client_id,
        &args.retry_policy(),
        &ct,
    )
    .await
    {
        Ok(publisher) => publisher,
        Err(Error::Cancelled) => {
            info!("Shutdown requested before the producer connected");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting to send sensor data to topic '{}'", args.topic);

    let mut generator = ReadingGenerator::new(rng);
    match producer::run_until_shutdown(
        &publisher,
        &mut generator,
        args.interval(),
        args.flush_timeout(),
        &ct,
    )
    .await
    {
        Ok(stats) => {
            info!(
                "Producer stopped: {} published, {} failed, {} self-routes skipped",
                stats.published, stats.failed, stats.skipped_routes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to flush pending readings: {}", e);
            ExitCode::FAILURE
        }
    }
}
