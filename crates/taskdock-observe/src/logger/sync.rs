//! Periodic re-detection of the local UTC offset, so DST changes reach log
//! timestamps without a restart.
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::logger::object::timezone::sync_local_offset;

/// Delay between two offset checks.
pub const TZ_SYNC_INTERVAL: Duration = Duration::from_secs(3_600);

/// Spawn the sync loop on the current runtime; it stops when `cancel` fires.
pub fn spawn_timezone_sync(every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; startup already detected the offset.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("timezone sync stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if sync_local_offset() {
                        debug!("timezone sync applied a new offset");
                    }
                }
            }
        }
    })
}
