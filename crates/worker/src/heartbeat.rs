//! Worker liveness heartbeats.
//!
//! Each worker upserts {worker_id, last_seen=now, status, jobs_processed}
//! into the shared registry on a fixed tick while it runs, so the monitor
//! can distinguish "slow but alive" from "stuck". The tick loop mirrors the
//! rest of our background tasks: interval + select on a shutdown Notify.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use listpilot_core::job::{WorkerHeartbeat, WorkerStatus};
use listpilot_store::traits::HeartbeatStore;

/// Stable identity for this worker process.
pub fn worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string());
    format!("{}-{}", host, std::process::id())
}

/// Handle to a running heartbeat loop.
pub struct HeartbeatTask {
    worker_id: String,
    jobs_processed: Arc<AtomicI64>,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl HeartbeatTask {
    /// Spawn the tick loop. An initial beat is written immediately so the
    /// worker is visible before its first interval elapses.
    pub fn spawn(
        store: Arc<dyn HeartbeatStore>,
        worker_id: String,
        interval: Duration,
    ) -> Self {
        let jobs_processed = Arc::new(AtomicI64::new(0));
        let shutdown = Arc::new(Notify::new());

        let loop_store = store.clone();
        let loop_id = worker_id.clone();
        let loop_count = jobs_processed.clone();
        let loop_shutdown = shutdown.clone();

        let handle = tokio::spawn(async move {
            beat(&loop_store, &loop_id, WorkerStatus::Active, &loop_count).await;

            let mut ticker = tokio::time::interval(interval);
            // Skip the immediate first tick (we already sent an initial beat)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        beat(&loop_store, &loop_id, WorkerStatus::Active, &loop_count).await;
                    }
                    _ = loop_shutdown.notified() => {
                        break;
                    }
                }
            }

            // Final beat: stopped (going down cleanly).
            beat(&loop_store, &loop_id, WorkerStatus::Stopped, &loop_count).await;
            info!(worker = %loop_id, "heartbeat loop stopped");
        });

        Self {
            worker_id,
            jobs_processed,
            shutdown,
            handle,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Bump the processed-jobs counter reported with the next beat.
    pub fn record_job(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Stop the loop and wait for the final "stopped" beat to be written.
    pub async fn stop(self) {
        self.shutdown.notify_waiters();
        if let Err(e) = self.handle.await {
            warn!(worker = %self.worker_id, "heartbeat task join failed: {e}");
        }
    }
}

async fn beat(
    store: &Arc<dyn HeartbeatStore>,
    worker_id: &str,
    status: WorkerStatus,
    jobs_processed: &AtomicI64,
) {
    let heartbeat = WorkerHeartbeat {
        worker_id: worker_id.to_string(),
        last_seen: Utc::now(),
        status,
        jobs_processed: jobs_processed.load(Ordering::Relaxed),
        metadata: serde_json::json!({ "pid": std::process::id() }),
    };

    if let Err(e) = store.beat(&heartbeat).await {
        warn!(worker = %worker_id, error = %e, "failed to write heartbeat");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listpilot_store::MemoryStore;

    #[tokio::test]
    async fn heartbeats_tick_and_stop_cleanly() {
        let store = Arc::new(MemoryStore::new());
        let task = HeartbeatTask::spawn(
            store.clone() as Arc<dyn HeartbeatStore>,
            "test-worker".into(),
            Duration::from_millis(20),
        );

        task.record_job();
        task.record_job();
        tokio::time::sleep(Duration::from_millis(70)).await;

        let workers = store.list_workers().await.unwrap();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].worker_id, "test-worker");
        assert_eq!(workers[0].status, WorkerStatus::Active);
        assert_eq!(workers[0].jobs_processed, 2);

        task.stop().await;

        let workers = store.list_workers().await.unwrap();
        assert_eq!(workers[0].status, WorkerStatus::Stopped);
    }

    #[test]
    fn worker_id_includes_pid() {
        let id = worker_id();
        assert!(id.ends_with(&std::process::id().to_string()));
    }
}
