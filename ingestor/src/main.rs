mod broker;
mod config;
mod decode;
mod errors;
mod http;
mod metrics;
mod model;
mod store;
mod supervisor;
#[cfg(test)]
mod testing;
mod worker;

use std::process::ExitCode;

use clap::Parser;
use config::Args;
use model::WorkerState;
use supervisor::KafkaMongoConnector;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    common::logging::init();

    info!("Starting telemetry ingestor");
    info!(
        "Kafka: {}, topic: {}, group: {}",
        args.brokers, args.topic, args.group_id
    );
    info!(
        "MongoDB: {}, collection: {}.{}",
        store::redact(&args.mongo_uri),
        args.mongo_db,
        args.mongo_collection
    );
    if args.reset_collection {
        info!("Collection reset enabled: existing documents will be deleted on startup");
    }

    if let Err(e) = metrics::init_metrics() {
        error!("Failed to register metrics: {}", e);
        return ExitCode::FAILURE;
    }

    let ct = CancellationToken::new();
    common::shutdown::listen(ct.clone());

    let (state_tx, state_rx) = watch::channel(WorkerState::ConnectingBroker);

    let server_handle = args.http_addr.clone().map(|addr| {
        let router = http::create_router(state_rx);
        let ct = ct.clone();
        tokio::spawn(async move {
            if let Err(e) = http::serve(&addr, router, ct).await {
                error!("HTTP server error: {}", e);
            }
        })
    });

    let client_id = format!("ingestor-{}", uuid::Uuid::new_v4());
    let connector =
        KafkaMongoConnector::new(args.broker_settings(client_id), args.store_settings());

    let result = supervisor::run(&connector, &args.supervisor_options(), &state_tx, &ct).await;

    ct.cancel();
    if let Some(handle) = server_handle {
        if let Err(e) = handle.await {
            error!("HTTP server task failed: {}", e);
        }
    }

    match result {
        Ok(()) => {
            info!("Consumer stopped");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
