//! Background TTL sweeper: evicts terminal runs past `RUN_TTL_SEC` from
//! the registry on a fixed interval. `tokio::spawn`s a
//! `loop { sleep; tick }` for the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use crate::runtime::registry::RunRegistry;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn spawn(registry: Arc<RunRegistry>, ttl: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = registry.sweep_expired(ttl);
            if evicted > 0 {
                tracing::debug!(evicted, "swept expired runs");
            }
        }
    });
}
