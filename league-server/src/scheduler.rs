//! Scheduled bulk rollover
//!
//! Background task that runs the rollover once at startup, then sleeps until
//! the next period boundary plus a grace delay (or the poll interval, if
//! sooner) and runs it again. Stops when its cancellation token fires.

use crate::config::SchedulerConfig;
use crate::engine::LeagueEngine;
use crate::period::PeriodId;
use crate::rollover::RolloverOutcome;
use chrono::{DateTime, Utc};
use league_common::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Journals closed back to back before yielding to the next wake-up
const MAX_CATCH_UP_PASSES: usize = 8;

/// Time to sleep from `now` before the next rollover attempt
pub fn next_wake_delay(now: DateTime<Utc>, poll_interval: Duration, grace: Duration) -> Duration {
    let boundary = PeriodId::containing(now).ends_at();
    let until_boundary = (boundary - now).to_std().unwrap_or(Duration::ZERO);
    (until_boundary + grace).min(poll_interval)
}

/// Run rollovers until the ledger has caught up with the current period
///
/// A resumed journal can close an older week and leave records one period
/// behind, so a completed pass that did not reach the current period is
/// followed by another.
pub async fn run_rollover(engine: &LeagueEngine) {
    for _ in 0..MAX_CATCH_UP_PASSES {
        match engine.trigger_rollover().await {
            Ok(RolloverOutcome::Completed(snapshot)) => {
                if snapshot.next_period_id >= engine.current_period() {
                    return;
                }
                debug!("Rollover reached {}; continuing", snapshot.next_period_id);
            }
            Ok(RolloverOutcome::UpToDate(_)) => {
                debug!("Scheduled rollover: ledger up to date");
                return;
            }
            Err(Error::RolloverInProgress(_)) => {
                debug!("Scheduled rollover skipped: sweep already running");
                return;
            }
            Err(e @ Error::RolloverIncomplete { .. }) => {
                warn!("Scheduled rollover incomplete, will resume: {}", e);
                return;
            }
            Err(e) => {
                error!("Scheduled rollover failed: {}", e);
                return;
            }
        }
    }
}

/// Spawn the scheduler; it exits when `cancel` is cancelled
pub fn spawn(
    engine: Arc<LeagueEngine>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Rollover scheduler started (poll {}s, grace {}s)",
            config.poll_interval_secs, config.grace_secs
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = run_rollover(&engine) => {}
            }

            let delay = next_wake_delay(engine.now(), config.poll_interval(), config.grace());
            debug!("Next rollover check in {:?}", delay);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Rollover scheduler stopped");
    })
}
