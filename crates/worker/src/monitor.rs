//! Stale-worker detection.
//!
//! A worker that missed several consecutive heartbeats is presumed dead.
//! Flagging it bounds the recovery latency for orphaned work: the underlying
//! queue message redelivers after its visibility timeout, and the
//! idempotency key makes the redo safe — this monitor exists so operators
//! see the death instead of an indefinite hang.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{info, warn};

use listpilot_core::job::WorkerHeartbeat;
use listpilot_store::error::StoreError;
use listpilot_store::traits::HeartbeatStore;

pub struct StaleWorkerMonitor {
    store: Arc<dyn HeartbeatStore>,
    stale_after: Duration,
}

impl StaleWorkerMonitor {
    /// `stale_after` should be a multiple of the heartbeat interval
    /// (e.g. 2 min at a 20s tick) so one slow beat doesn't flag a worker.
    pub fn new(store: Arc<dyn HeartbeatStore>, stale_after: Duration) -> Self {
        Self { store, stale_after }
    }

    /// One monitor cycle: flag every worker silent past the cutoff.
    pub async fn check(&self) -> Result<Vec<WorkerHeartbeat>, StoreError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stale_after)
                .unwrap_or_else(|_| chrono::Duration::seconds(120));
        let flagged = self.store.mark_stale(cutoff).await?;

        for worker in &flagged {
            warn!(
                worker = %worker.worker_id,
                last_seen = %worker.last_seen,
                "Worker presumed dead — no heartbeat since cutoff"
            );
        }
        Ok(flagged)
    }

    /// Periodic check loop until shutdown.
    pub async fn run(self, interval: Duration, shutdown: Arc<Notify>) {
        info!(interval_secs = interval.as_secs(), "Stale-worker monitor started");
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.check().await {
                        warn!(error = %e, "Stale-worker check failed");
                    }
                }
                _ = shutdown.notified() => {
                    info!("Stale-worker monitor stopped");
                    break;
                }
            }
        }
    }
}
