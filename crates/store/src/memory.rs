//! In-memory store with the same contracts as [`crate::PgStore`].
//!
//! Backs tests and the `--memory` dev mode. The idempotent-upsert and
//! conditional-transition semantics match the SQL implementation exactly —
//! flow tests rely on that equivalence.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use listpilot_core::job::{
    Job, JobResult, JobStatus, QueueHistoryEvent, ResultStatus, WorkerHeartbeat, WorkerStatus,
};
use listpilot_core::profile::BusinessProfile;

use crate::error::StoreError;
use crate::traits::{
    EventSource, HeartbeatStore, HistoryStore, JobStore, ProfileStore, ResultCounts, ResultStore,
    StoreEvent, UpsertOutcome,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    /// idempotency_key → result row.
    results: HashMap<String, JobResult>,
    history: Vec<QueueHistoryEvent>,
    heartbeats: HashMap<String, WorkerHeartbeat>,
    profiles: HashMap<String, BusinessProfile>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for MemoryStore {
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock().unwrap();
            // Idempotent create: re-enqueue of an existing job is a no-op.
            inner.jobs.entry(job.id).or_insert_with(|| job.clone());
        }
        self.emit(StoreEvent::JobChanged {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
        });
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.lock().unwrap().jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<Job> = inner.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn mark_in_progress(&self, id: Uuid) -> Result<bool, StoreError> {
        let claimed = {
            let mut inner = self.inner.lock().unwrap();
            match inner.jobs.get_mut(&id) {
                Some(job) if job.status == JobStatus::Pending => {
                    job.status = JobStatus::InProgress;
                    job.started_at = Some(Utc::now());
                    true
                }
                Some(_) => false,
                None => return Err(StoreError::NotFound(format!("job {id}"))),
            }
        };
        if claimed {
            self.emit(StoreEvent::JobChanged {
                job_id: id,
                status: JobStatus::InProgress,
                progress: 0,
            });
        }
        Ok(claimed)
    }

    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<(), StoreError> {
        let progress = progress.clamp(0, 100);
        let updated = {
            let mut inner = self.inner.lock().unwrap();
            match inner.jobs.get_mut(&id) {
                Some(job) if job.status == JobStatus::InProgress => {
                    job.progress = progress;
                    true
                }
                _ => false,
            }
        };
        if updated {
            self.emit(StoreEvent::JobChanged {
                job_id: id,
                status: JobStatus::InProgress,
                progress,
            });
        }
        Ok(())
    }

    async fn finalize(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::InvalidTransition(format!(
                "finalize called with non-terminal status '{status}'"
            )));
        }

        let finalized = {
            let mut inner = self.inner.lock().unwrap();
            match inner.jobs.get_mut(&id) {
                Some(job) if job.status == JobStatus::InProgress => {
                    job.status = status;
                    job.completed_at = Some(Utc::now());
                    job.error_message = error_message.map(|s| s.to_string());
                    true
                }
                _ => false,
            }
        };
        if finalized {
            self.emit(StoreEvent::JobChanged {
                job_id: id,
                status,
                progress: 100,
            });
        }
        Ok(finalized)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn upsert_result(&self, result: &JobResult) -> Result<UpsertOutcome, StoreError> {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            match inner.results.get_mut(&result.idempotency_key) {
                Some(existing) if existing.status == ResultStatus::Submitted => {
                    // First success wins: later attempts under the same key
                    // are no-ops.
                    UpsertOutcome::IgnoredPriorSuccess
                }
                Some(existing) => {
                    existing.status = result.status;
                    existing.payload = result.payload.clone();
                    existing.response_log = result.response_log.clone();
                    existing.error_message = result.error_message.clone();
                    existing.updated_at = Utc::now();
                    UpsertOutcome::Applied
                }
                None => {
                    inner
                        .results
                        .insert(result.idempotency_key.clone(), result.clone());
                    UpsertOutcome::Applied
                }
            }
        };

        if outcome == UpsertOutcome::Applied {
            self.emit(StoreEvent::ResultChanged {
                job_id: result.job_id,
                directory_name: result.directory_name.clone(),
                status: result.status,
            });
        }
        Ok(outcome)
    }

    async fn get_by_key(&self, idempotency_key: &str) -> Result<Option<JobResult>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .results
            .get(idempotency_key)
            .cloned())
    }

    async fn results_for_job(&self, job_id: Uuid) -> Result<Vec<JobResult>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut results: Vec<JobResult> = inner
            .results
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.directory_name.cmp(&b.directory_name))
        });
        Ok(results)
    }

    async fn count_by_status(&self, job_id: Uuid) -> Result<ResultCounts, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut counts = ResultCounts::default();
        for result in inner.results.values().filter(|r| r.job_id == job_id) {
            match result.status {
                ResultStatus::Submitted => counts.submitted += 1,
                ResultStatus::Failed => counts.failed += 1,
                ResultStatus::Skipped => counts.skipped += 1,
                ResultStatus::Retry => counts.retry += 1,
                ResultStatus::NeedsReview => counts.needs_review += 1,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, event: &QueueHistoryEvent) -> Result<(), StoreError> {
        self.inner.lock().unwrap().history.push(event.clone());
        self.emit(StoreEvent::HistoryAppended {
            job_id: event.job_id,
            event: event.event,
        });
        Ok(())
    }

    async fn events_for_job(&self, job_id: Uuid) -> Result<Vec<QueueHistoryEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        // Insertion order is chronological order here.
        Ok(inner
            .history
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HeartbeatStore for MemoryStore {
    async fn beat(&self, heartbeat: &WorkerHeartbeat) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .heartbeats
            .insert(heartbeat.worker_id.clone(), heartbeat.clone());
        self.emit(StoreEvent::HeartbeatChanged {
            worker_id: heartbeat.worker_id.clone(),
            status: heartbeat.status,
        });
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerHeartbeat>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut workers: Vec<WorkerHeartbeat> = inner.heartbeats.values().cloned().collect();
        workers.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        Ok(workers)
    }

    async fn mark_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<WorkerHeartbeat>, StoreError> {
        let flagged: Vec<WorkerHeartbeat> = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .heartbeats
                .values_mut()
                .filter(|hb| {
                    hb.last_seen < cutoff
                        && matches!(hb.status, WorkerStatus::Active | WorkerStatus::Idle)
                })
                .map(|hb| {
                    hb.status = WorkerStatus::Stale;
                    hb.clone()
                })
                .collect()
        };
        for hb in &flagged {
            self.emit(StoreEvent::HeartbeatChanged {
                worker_id: hb.worker_id.clone(),
                status: hb.status,
            });
        }
        Ok(flagged)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn fetch_profile(&self, customer_id: &str) -> Result<Option<BusinessProfile>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .profiles
            .get(customer_id)
            .cloned())
    }

    async fn upsert_profile(
        &self,
        customer_id: &str,
        profile: &BusinessProfile,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .insert(customer_id.to_string(), profile.clone());
        Ok(())
    }
}
