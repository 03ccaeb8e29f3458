//! PostgreSQL-backed store.
//!
//! All cross-worker coordination rides on two query shapes:
//! conditional UPDATEs for job-status claims (rows_affected tells the caller
//! whether it won), and `INSERT ... ON CONFLICT (idempotency_key) DO UPDATE
//! ... WHERE status <> 'submitted'` for results, so a prior success is never
//! overwritten no matter how many workers race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::sync::broadcast;
use uuid::Uuid;

use listpilot_core::job::{
    Job, JobResult, JobStatus, QueueHistoryEvent, WorkerHeartbeat,
};
use listpilot_core::profile::BusinessProfile;

use crate::error::StoreError;
use crate::traits::{
    EventSource, HeartbeatStore, HistoryStore, JobStore, ProfileStore, ResultCounts, ResultStore,
    StoreEvent, UpsertOutcome,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct PgStore {
    pool: PgPool,
    events: broadcast::Sender<StoreEvent>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { pool, events }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine; the feed is best-effort.
        let _ = self.events.send(event);
    }
}

impl EventSource for PgStore {
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

// ── Row mapping ───────────────────────────────────────────────

fn job_from_row(row: &PgRow) -> Result<Job, StoreError> {
    Ok(Job {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Decode)?,
        package_size: row.try_get("package_size")?,
        progress: row.try_get("progress")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        error_message: row.try_get("error_message")?,
    })
}

fn result_from_row(row: &PgRow) -> Result<JobResult, StoreError> {
    Ok(JobResult {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        directory_name: row.try_get("directory_name")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Decode)?,
        idempotency_key: row.try_get("idempotency_key")?,
        payload: row.try_get("payload")?,
        response_log: row.try_get("response_log")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<QueueHistoryEvent, StoreError> {
    Ok(QueueHistoryEvent {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        directory_name: row.try_get("directory_name")?,
        event: row
            .try_get::<String, _>("event")?
            .parse()
            .map_err(StoreError::Decode)?,
        details: row.try_get("details")?,
        worker_id: row.try_get("worker_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn heartbeat_from_row(row: &PgRow) -> Result<WorkerHeartbeat, StoreError> {
    Ok(WorkerHeartbeat {
        worker_id: row.try_get("worker_id")?,
        last_seen: row.try_get("last_seen")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Decode)?,
        jobs_processed: row.try_get("jobs_processed")?,
        metadata: row.try_get("metadata")?,
    })
}

// ── Jobs ──────────────────────────────────────────────────────

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO jobs (id, customer_id, status, package_size, progress, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job.id)
        .bind(&job.customer_id)
        .bind(job.status.as_str())
        .bind(job.package_size)
        .bind(job.progress)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        self.emit(StoreEvent::JobChanged {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
        });
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_jobs(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn mark_in_progress(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'in_progress', started_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
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
        let result = sqlx::query(
            "UPDATE jobs SET progress = $2 WHERE id = $1 AND status = 'in_progress'",
        )
        .bind(id)
        .bind(progress)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
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

        let result = sqlx::query(
            "UPDATE jobs SET status = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status = 'in_progress'",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        let finalized = result.rows_affected() == 1;
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

// ── Results ───────────────────────────────────────────────────

#[async_trait]
impl ResultStore for PgStore {
    async fn upsert_result(&self, result: &JobResult) -> Result<UpsertOutcome, StoreError> {
        let query_result = sqlx::query(
            "INSERT INTO job_results \
             (id, job_id, directory_name, status, idempotency_key, payload, response_log, error_message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) \
             ON CONFLICT (idempotency_key) DO UPDATE SET \
                 status = EXCLUDED.status, \
                 payload = EXCLUDED.payload, \
                 response_log = EXCLUDED.response_log, \
                 error_message = EXCLUDED.error_message, \
                 updated_at = NOW() \
             WHERE job_results.status <> 'submitted'",
        )
        .bind(result.id)
        .bind(result.job_id)
        .bind(&result.directory_name)
        .bind(result.status.as_str())
        .bind(&result.idempotency_key)
        .bind(&result.payload)
        .bind(&result.response_log)
        .bind(&result.error_message)
        .execute(&self.pool)
        .await?;

        if query_result.rows_affected() == 0 {
            // The ON CONFLICT WHERE guard rejected the write: a prior
            // attempt already succeeded under this key.
            return Ok(UpsertOutcome::IgnoredPriorSuccess);
        }

        self.emit(StoreEvent::ResultChanged {
            job_id: result.job_id,
            directory_name: result.directory_name.clone(),
            status: result.status,
        });
        Ok(UpsertOutcome::Applied)
    }

    async fn get_by_key(&self, idempotency_key: &str) -> Result<Option<JobResult>, StoreError> {
        let row = sqlx::query("SELECT * FROM job_results WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(result_from_row).transpose()
    }

    async fn results_for_job(&self, job_id: Uuid) -> Result<Vec<JobResult>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM job_results WHERE job_id = $1 ORDER BY created_at, directory_name",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(result_from_row).collect()
    }

    async fn count_by_status(&self, job_id: Uuid) -> Result<ResultCounts, StoreError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM job_results WHERE job_id = $1 GROUP BY status",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ResultCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            match status.as_str() {
                "submitted" => counts.submitted = n,
                "failed" => counts.failed = n,
                "skipped" => counts.skipped = n,
                "retry" => counts.retry = n,
                "needs_review" => counts.needs_review = n,
                other => return Err(StoreError::Decode(format!("unknown result status: {other}"))),
            }
        }
        Ok(counts)
    }
}

// ── History ───────────────────────────────────────────────────

#[async_trait]
impl HistoryStore for PgStore {
    async fn append(&self, event: &QueueHistoryEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO queue_history (id, job_id, directory_name, event, details, worker_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(event.id)
        .bind(event.job_id)
        .bind(&event.directory_name)
        .bind(event.event.as_str())
        .bind(&event.details)
        .bind(&event.worker_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        self.emit(StoreEvent::HistoryAppended {
            job_id: event.job_id,
            event: event.event,
        });
        Ok(())
    }

    async fn events_for_job(&self, job_id: Uuid) -> Result<Vec<QueueHistoryEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM queue_history WHERE job_id = $1 ORDER BY created_at, id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(history_from_row).collect()
    }
}

// ── Heartbeats ────────────────────────────────────────────────

#[async_trait]
impl HeartbeatStore for PgStore {
    async fn beat(&self, heartbeat: &WorkerHeartbeat) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO worker_heartbeats (worker_id, last_seen, status, jobs_processed, metadata) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (worker_id) DO UPDATE SET \
                 last_seen = EXCLUDED.last_seen, \
                 status = EXCLUDED.status, \
                 jobs_processed = EXCLUDED.jobs_processed, \
                 metadata = EXCLUDED.metadata",
        )
        .bind(&heartbeat.worker_id)
        .bind(heartbeat.last_seen)
        .bind(heartbeat.status.as_str())
        .bind(heartbeat.jobs_processed)
        .bind(&heartbeat.metadata)
        .execute(&self.pool)
        .await?;

        self.emit(StoreEvent::HeartbeatChanged {
            worker_id: heartbeat.worker_id.clone(),
            status: heartbeat.status,
        });
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerHeartbeat>, StoreError> {
        let rows = sqlx::query("SELECT * FROM worker_heartbeats ORDER BY worker_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(heartbeat_from_row).collect()
    }

    async fn mark_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<WorkerHeartbeat>, StoreError> {
        let rows = sqlx::query(
            "UPDATE worker_heartbeats SET status = 'stale' \
             WHERE last_seen < $1 AND status IN ('active', 'idle') \
             RETURNING *",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let flagged: Result<Vec<_>, _> = rows.iter().map(heartbeat_from_row).collect();
        let flagged = flagged?;
        for hb in &flagged {
            self.emit(StoreEvent::HeartbeatChanged {
                worker_id: hb.worker_id.clone(),
                status: hb.status,
            });
        }
        Ok(flagged)
    }
}

// ── Profiles ──────────────────────────────────────────────────

#[async_trait]
impl ProfileStore for PgStore {
    async fn fetch_profile(&self, customer_id: &str) -> Result<Option<BusinessProfile>, StoreError> {
        let row = sqlx::query("SELECT profile FROM business_profiles WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: serde_json::Value = row.try_get("profile")?;
                let profile = serde_json::from_value(value)?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    async fn upsert_profile(
        &self,
        customer_id: &str,
        profile: &BusinessProfile,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO business_profiles (customer_id, profile, updated_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (customer_id) DO UPDATE SET \
                 profile = EXCLUDED.profile, \
                 updated_at = NOW()",
        )
        .bind(customer_id)
        .bind(serde_json::to_value(profile)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
