// src/sweeper.rs
//! Expiry sweeper: a recurring, stateless `delete_expired` call.

use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::SightingStore;

/// Default sweep cadence (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Clone, Copy, Debug)]
pub struct SweeperCfg {
    pub interval_secs: u64,
}

impl Default for SweeperCfg {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

/// One sweep cycle. Errors are logged and swallowed; the next cycle retries.
pub async fn sweep_once(store: &SightingStore) -> Option<u64> {
    counter!("sightings_sweep_runs_total").increment(1);
    gauge!("sightings_sweep_last_run_ts").set(store.now().timestamp() as f64);

    match store.delete_expired().await {
        Ok(removed) => {
            counter!("sightings_swept_total").increment(removed);
            tracing::info!(target: "sightings::sweeper", removed, "expiry sweep done");
            Some(removed)
        }
        Err(e) => {
            counter!("sightings_sweep_errors_total").increment(1);
            tracing::error!(target: "sightings::sweeper", error = %e, "expiry sweep failed");
            None
        }
    }
}

/// Handle to a running sweeper task.
pub struct Sweeper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweeper. The first sweep runs immediately, then every
    /// `cfg.interval_secs`.
    pub fn spawn(store: SightingStore, cfg: SweeperCfg) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let period = Duration::from_secs(cfg.interval_secs.max(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(
                target: "sightings::sweeper",
                interval_secs = period.as_secs(),
                "expiry sweeper started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_once(&store).await;
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!(target: "sightings::sweeper", "expiry sweeper stopped");
        });

        Self { stop, handle }
    }

    /// Signals the task to stop and waits for the in-flight cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(target: "sightings::sweeper", error = %e, "sweeper task ended abnormally");
        }
    }
}
