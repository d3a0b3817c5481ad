use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::infra::store::CodeStore;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Sweep period for a given TTL: half of it, so it is always strictly shorter.
pub fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 2).max(MIN_SWEEP_INTERVAL)
}

/// Periodically purge expired codes, independent of request traffic.
///
/// Only memory reclamation depends on this task; `validate` rechecks the TTL
/// itself, so a late or skipped sweep never lets an expired code through.
pub fn spawn_sweeper(store: Arc<CodeStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = store.sweep(store.now());
            if purged > 0 {
                debug!(purged, remaining = store.len(), "expired access codes swept");
            }
        }
    })
}
