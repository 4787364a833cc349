//! Periodic purge of expired challenges and spend outside the day window.
//!
//! Expiry and windows are enforced on every read, so the sweeper only
//! reclaims storage.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::db::{DAY_MS, SpendLedger, window_start};
use crate::link::challenge::ChallengeService;

/// One sweep at `now_ms`. Spend from before the current UTC day is dropped.
pub async fn sweep_once(challenges: &ChallengeService, ledger: &dyn SpendLedger, now_ms: i64) {
    if let Err(code) = challenges.sweep_expired(now_ms).await {
        tracing::warn!(code = code.as_str(), "Challenge sweep failed");
    }
    match ledger.prune_before(window_start(now_ms, DAY_MS)).await {
        Ok(0) => {}
        Ok(pruned) => tracing::debug!(pruned, "Pruned spend records outside the day window"),
        Err(e) => tracing::warn!(error = %e, "Spend prune failed"),
    }
}

/// Spawn the sweeper. Abort the returned handle to stop it.
pub fn spawn_sweeper(
    challenges: Arc<ChallengeService>,
    ledger: Arc<dyn SpendLedger>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&challenges, ledger.as_ref(), Utc::now().timestamp_millis()).await;
        }
    })
}
