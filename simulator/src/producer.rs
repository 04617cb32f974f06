use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::publisher::Publisher;
use crate::telemetry::ReadingGenerator;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub published: u64,
    pub failed: u64,
    pub skipped_routes: u64,
}

#[derive(Default)]
struct Tally {
    published: AtomicU64,
    failed: AtomicU64,
}

/// Queues one reading per `interval` until `ct` is cancelled, then flushes.
///
/// Publishing never blocks the loop: each delivery report is awaited on its
/// own task, and failures are logged and counted there. The sleep between
/// readings is the only pacing. On shutdown every queued reading is flushed
/// before returning; a flush error is returned.
pub async fn run_until_shutdown<P, R>(
    publisher: &P,
    generator: &mut ReadingGenerator<R>,
    interval: Duration,
    flush_timeout: Duration,
    ct: &CancellationToken,
) -> Result<Stats>
where
    P: Publisher + ?Sized,
    R: Rng,
{
    info!("Publishing a reading every {:?}", interval);

    let tally = Arc::new(Tally::default());
    let mut deliveries = JoinSet::new();
    let mut queued = 0u64;

    while !ct.is_cancelled() {
        let reading = generator.next_reading();

        match publisher.publish(&reading) {
            Ok(pending) => {
                queued += 1;
                info!(
                    "Sent: {} | {}V | {}°C | {} -> {}",
                    reading.device_id,
                    reading.battery_level,
                    reading.temperature,
                    reading.route_from,
                    reading.route_to
                );

                let tally = Arc::clone(&tally);
                let device_id = reading.device_id.clone();
                deliveries.spawn(async move {
                    match pending.await {
                        Ok(delivery) => {
                            tally.published.fetch_add(1, Ordering::Relaxed);
                            debug!(
                                "Delivered {} to partition {} at offset {}",
                                device_id, delivery.partition, delivery.offset
                            );
                        }
                        Err(e) => {
                            tally.failed.fetch_add(1, Ordering::Relaxed);
                            error!("Failed to deliver reading from {}: {}", device_id, e);
                        }
                    }
                });
            }
            Err(e) => {
                tally.failed.fetch_add(1, Ordering::Relaxed);
                error!("Failed to publish reading from {}: {}", reading.device_id, e);
            }
        }

        while deliveries.try_join_next().is_some() {}

        if queued > 0 && queued % 100 == 0 {
            info!(
                "Queued {} readings ({} delivered, {} failed)",
                queued,
                tally.published.load(Ordering::Relaxed),
                tally.failed.load(Ordering::Relaxed)
            );
        }

        tokio::select! {
            _ = ct.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Stopping producer, flushing pending readings...");
    if let Err(e) = publisher.flush(flush_timeout).await {
        warn!(
            "{} readings still unacknowledged after flush",
            deliveries.len()
        );
        deliveries.abort_all();
        return Err(e);
    }
    while deliveries.join_next().await.is_some() {}

    Ok(Stats {
        published: tally.published.load(Ordering::Relaxed),
        failed: tally.failed.load(Ordering::Relaxed),
        skipped_routes: generator.skipped_routes(),
    })
}
