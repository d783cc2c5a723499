use crate::lifecycle::{RoundLifecycleManager, TickOutcome};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Ticks the manager every `period` until `shutdown` flips to true.
///
/// Tick errors are logged and the loop carries on; the manager has already
/// failed the round when an error reaches this point.
pub async fn run_ticker(
    manager: Arc<RoundLifecycleManager>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match manager.on_tick(Utc::now()) {
                    Ok(TickOutcome::Rolled(settlement)) => {
                        tracing::debug!("Ticker rolled round {}", settlement.round_id);
                    }
                    Ok(TickOutcome::NewRound { round_id }) => {
                        tracing::debug!("Ticker opened round {}", round_id);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Tick failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Round ticker stopping");
                    break;
                }
            }
        }
    }
}
