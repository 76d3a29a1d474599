use std::time::Duration;

use chrono::{DateTime, Utc};
use server_api::{reap_expired, ApiContext};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Spawns the periodic sweep that physically deletes expired stories.
/// Listing does its own expiry filtering, so a slow or failing sweep only
/// delays reclaiming space.
pub fn spawn_reaper(api: ApiContext, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            reap_once(&api, Utc::now()).await;
        }
    })
}

pub async fn reap_once(api: &ApiContext, now: DateTime<Utc>) -> Option<u64> {
    match reap_expired(api, now).await {
        Ok(0) => {
            debug!("reaper: nothing expired");
            Some(0)
        }
        Ok(removed) => {
            info!(removed, "reaper: removed expired stories");
            Some(removed)
        }
        Err(error) => {
            warn!(error = %error.message, "reaper: sweep failed; will retry next interval");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/reaper_tests.rs"]
mod tests;
