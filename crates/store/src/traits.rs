//! DAO traits over the result store.
//!
//! The result store is the only resource shared across workers. Every write
//! is an upsert keyed by idempotency_key (results) or a conditional update
//! (job status), making concurrent writers commutative without locks —
//! cross-worker coordination happens entirely through these semantics.
//!
//! Writers publish a [`StoreEvent`] on every successful mutation so
//! dashboards subscribe to changes instead of polling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use listpilot_core::job::{
    HistoryEvent, Job, JobResult, JobStatus, QueueHistoryEvent, ResultStatus, WorkerHeartbeat,
    WorkerStatus,
};
use listpilot_core::profile::BusinessProfile;

use crate::error::StoreError;

// ── Change notification ───────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    JobChanged {
        job_id: Uuid,
        status: JobStatus,
        progress: i32,
    },
    ResultChanged {
        job_id: Uuid,
        directory_name: String,
        status: ResultStatus,
    },
    HistoryAppended {
        job_id: Uuid,
        event: HistoryEvent,
    },
    HeartbeatChanged {
        worker_id: String,
        status: WorkerStatus,
    },
}

/// Anything that exposes the store's change feed.
pub trait EventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

// ── Upsert outcome ────────────────────────────────────────────

/// What an idempotent result upsert actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Row inserted or updated with the new attempt's data.
    Applied,
    /// A prior attempt already succeeded under this key; the write was a
    /// no-op. First success wins.
    IgnoredPriorSuccess,
}

/// Per-status result counts for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultCounts {
    pub submitted: i64,
    pub failed: i64,
    pub skipped: i64,
    pub retry: i64,
    pub needs_review: i64,
}

impl ResultCounts {
    pub fn total(&self) -> i64 {
        self.submitted + self.failed + self.skipped + self.retry + self.needs_review
    }
}

// ── DAOs ──────────────────────────────────────────────────────

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job. Idempotent: re-inserting an existing id is
    /// a no-op (enqueue paths can be retried).
    async fn create_job(&self, job: &Job) -> Result<(), StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    async fn list_jobs(&self, limit: i64) -> Result<Vec<Job>, StoreError>;

    /// Claim a pending job: pending → in_progress. Returns true when this
    /// caller performed the transition, false when the job was already
    /// started (or finished) — the redelivery no-op case.
    async fn mark_in_progress(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Update progress (0–100) while the job is running.
    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<(), StoreError>;

    /// Terminal transition: in_progress → completed|failed. Returns true
    /// when this caller performed it. Monotonic — a finished job stays
    /// finished.
    async fn finalize(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Upsert a per-directory outcome keyed by idempotency_key.
    /// A row whose status is already `submitted` is never overwritten.
    async fn upsert_result(&self, result: &JobResult) -> Result<UpsertOutcome, StoreError>;

    async fn get_by_key(&self, idempotency_key: &str) -> Result<Option<JobResult>, StoreError>;

    async fn results_for_job(&self, job_id: Uuid) -> Result<Vec<JobResult>, StoreError>;

    async fn count_by_status(&self, job_id: Uuid) -> Result<ResultCounts, StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one audit event. The trail is append-only; there is no update
    /// or delete surface.
    async fn append(&self, event: &QueueHistoryEvent) -> Result<(), StoreError>;

    /// Events for a job in chronological order.
    async fn events_for_job(&self, job_id: Uuid) -> Result<Vec<QueueHistoryEvent>, StoreError>;
}

#[async_trait]
pub trait HeartbeatStore: Send + Sync {
    /// Upsert a worker's liveness record.
    async fn beat(&self, heartbeat: &WorkerHeartbeat) -> Result<(), StoreError>;

    async fn list_workers(&self) -> Result<Vec<WorkerHeartbeat>, StoreError>;

    /// Flag workers whose last_seen is older than `cutoff` as stale and
    /// return the newly flagged records.
    async fn mark_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<WorkerHeartbeat>, StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, customer_id: &str) -> Result<Option<BusinessProfile>, StoreError>;

    async fn upsert_profile(
        &self,
        customer_id: &str,
        profile: &BusinessProfile,
    ) -> Result<(), StoreError>;
}

/// The full store surface, as one trait object.
pub trait Store:
    JobStore + ResultStore + HistoryStore + HeartbeatStore + ProfileStore + EventSource
{
}

impl<T> Store for T where
    T: JobStore + ResultStore + HistoryStore + HeartbeatStore + ProfileStore + EventSource
{
}
