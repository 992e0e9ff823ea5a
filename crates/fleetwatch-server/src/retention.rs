//! Background task for sweeping expired events.
//!
//! Both backends already prune inline on every operation, so the sweep only
//! bounds how long expired data stays on disk or in memory while the
//! service is idle.

use fleetwatch_store::EventStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Starts a background task that periodically removes expired events.
///
/// Returns immediately if `interval_seconds` is `0`; otherwise runs
/// indefinitely.
///
/// # Arguments
///
/// * `store` - The shared event store.
/// * `interval_seconds` - Time in seconds to wait between sweeps.
pub async fn start_retention_task(store: Arc<dyn EventStore>, interval_seconds: u64) {
    if interval_seconds == 0 {
        tracing::info!("retention sweep disabled (interval=0)");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(
        interval_seconds,
        provider = %store.provider(),
        "starting event retention sweep task"
    );

    loop {
        sleep(interval).await;

        let store = Arc::clone(&store);
        let result = tokio::task::spawn_blocking(move || store.prune_expired()).await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    tracing::info!(count, "swept expired events");
                } else {
                    tracing::debug!("no expired events to sweep");
                }
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to sweep expired events");
            }
            Err(e) => {
                tracing::error!(error = %e, "retention task panicked or was cancelled");
            }
        }
    }
}
