use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::metrics::STORED_TOKENS;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepStats {
    pub expired_tokens: usize,
    pub idle_clients: usize,
}

/// One pass over both maps.
pub fn sweep(state: &AppState) -> SweepStats {
    let stats = SweepStats {
        expired_tokens: state.store.purge_expired(),
        idle_clients: state.rate_limiter.evict_expired(),
    };
    STORED_TOKENS.set(state.store.len() as f64);
    stats
}

// Background sweeper - runs until the task is aborted
pub async fn sweeper(state: Arc<AppState>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = every.as_secs(), "sweeper started");

    loop {
        ticker.tick().await;
        let stats = sweep(&state);
        if stats != SweepStats::default() {
            debug!(
                expired_tokens = stats.expired_tokens,
                idle_clients = stats.idle_clients,
                "sweep finished"
            );
        }
    }
}
