use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::service::RideService;

/// Periodically expire stale matches until `shutdown` flips to true or its sender is dropped
pub async fn start_expiry_worker(service: RideService, mut shutdown: watch::Receiver<bool>) {
    let period = service.lifecycle().sweep_interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = period.as_secs(),
        ttl_secs = service.lifecycle().ttl().num_seconds(),
        "Expiry worker started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.expire_stale(Utc::now()).await {
                    Ok(0) => debug!("No stale matches"),
                    Ok(count) => info!(count, "Expiry sweep finished"),
                    Err(e) => error!(error = %e, "Expiry sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Expiry worker stopping");
                    break;
                }
            }
        }
    }
}
