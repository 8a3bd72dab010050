use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::reconciler::Reconciler;

/// Background controller that republishes Endpoints on a fixed interval.
///
/// The first cycle runs as soon as the controller starts. Cycles never
/// overlap: a slow cycle pushes the next tick back instead of queueing it.
pub struct EndpointsSyncController {
    reconciler: Reconciler,
    interval: Duration,
}

impl EndpointsSyncController {
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Start the controller loop as a background task. It stops once
    /// `shutdown` flips to `true` (or its sender is dropped), letting a
    /// running cycle finish first.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "EndpointsSyncController started (interval={}s)",
                self.interval.as_secs()
            );
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if *shutdown.borrow_and_update() {
                    break;
                }
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let report = self.reconciler.run_cycle().await;
                        if report.source_failed {
                            warn!("Endpoints sync cycle skipped: {}", report);
                        } else {
                            info!("Endpoints sync cycle done: {}", report);
                        }
                    }
                }
            }
            info!("EndpointsSyncController stopped");
        })
    }
}
