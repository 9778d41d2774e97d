use std::sync::Arc;

use chrono::Duration;
use ridepool_service::{start_expiry_worker, RideService};
use ridepool_store::app_config::Config;
use ridepool_store::{InMemoryDirectory, RingbackNotifier};
use tokio::sync::{broadcast, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridepool_service=debug,ridepool_match=debug,ridepool_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let ttl = config.matching.ttl()?;
    tracing::info!(match_ttl_seconds = config.matching.match_ttl_seconds, "Starting ride matching service");

    let directory = Arc::new(InMemoryDirectory::new());
    let notifier = Arc::new(RingbackNotifier::new(&config.ringback));
    if config.ringback.from_number.is_none() || config.ringback.public_base_url.is_none() {
        tracing::warn!("Ringback is not configured, matches will be stored without calling anyone");
    }

    // Dialer hand-off
    let mut ringbacks = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match ringbacks.recv().await {
                Ok(event) => tracing::info!(role = ?event.role, to = %event.to, "Ringback queued for dialer"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dialer fell behind, ringbacks dropped")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let service = RideService::new(directory, notifier, ttl.unwrap_or_else(Duration::zero));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = match ttl {
        Some(_) => Some(tokio::spawn(start_expiry_worker(service.clone(), shutdown_rx))),
        None => {
            tracing::info!("Match expiry disabled");
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let _ = shutdown_tx.send(true);
    if let Some(worker) = worker {
        worker.await?;
    }
    Ok(())
}
