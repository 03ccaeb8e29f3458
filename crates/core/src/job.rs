//! Domain records: jobs, per-directory results, the audit timeline, and
//! worker heartbeats.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Job ───────────────────────────────────────────────────────

/// Lifecycle of a submission job.
///
/// Transitions are monotonic: pending → in_progress → {completed, failed}.
/// A job never regresses and terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving to `next` respects the monotonic transition order.
    pub fn can_transition(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// One queued submission job. Created at enqueue time; mutated only by the
/// orchestrator; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub customer_id: String,
    pub status: JobStatus,
    /// Target directory count for the purchased package.
    pub package_size: i32,
    /// 0–100, settled tasks over total.
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(id: Uuid, customer_id: impl Into<String>, package_size: i32) -> Self {
        Self {
            id,
            customer_id: customer_id.into(),
            status: JobStatus::Pending,
            package_size,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

// ── JobResult ─────────────────────────────────────────────────

/// Terminal state of one directory submission attempt chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Submitted,
    Failed,
    Skipped,
    Retry,
    /// Automation could not classify the outcome; surfaced for manual review.
    NeedsReview,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Submitted => "submitted",
            ResultStatus::Failed => "failed",
            ResultStatus::Skipped => "skipped",
            ResultStatus::Retry => "retry",
            ResultStatus::NeedsReview => "needs_review",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ResultStatus::Submitted),
            "failed" => Ok(ResultStatus::Failed),
            "skipped" => Ok(ResultStatus::Skipped),
            "retry" => Ok(ResultStatus::Retry),
            "needs_review" => Ok(ResultStatus::NeedsReview),
            other => Err(format!("unknown result status: {other}")),
        }
    }
}

/// Per-directory outcome row, keyed by a content-derived idempotency key.
/// Two attempts with the same key collapse to one logical effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub id: Uuid,
    pub job_id: Uuid,
    pub directory_name: String,
    pub status: ResultStatus,
    pub idempotency_key: String,
    /// Business-data snapshot that was (or would have been) submitted.
    pub payload: serde_json::Value,
    /// Structured step-by-step log of the automation run.
    pub response_log: serde_json::Value,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Queue history ─────────────────────────────────────────────

/// Audit-trail event kinds, in the order they normally occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    QueueClaimed,
    FlowTriggered,
    FlowStarted,
    SubmissionComplete,
    FlowCompleted,
    FlowFailed,
}

impl HistoryEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEvent::QueueClaimed => "queue_claimed",
            HistoryEvent::FlowTriggered => "flow_triggered",
            HistoryEvent::FlowStarted => "flow_started",
            HistoryEvent::SubmissionComplete => "submission_complete",
            HistoryEvent::FlowCompleted => "flow_completed",
            HistoryEvent::FlowFailed => "flow_failed",
        }
    }
}

impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue_claimed" => Ok(HistoryEvent::QueueClaimed),
            "flow_triggered" => Ok(HistoryEvent::FlowTriggered),
            "flow_started" => Ok(HistoryEvent::FlowStarted),
            "submission_complete" => Ok(HistoryEvent::SubmissionComplete),
            "flow_completed" => Ok(HistoryEvent::FlowCompleted),
            "flow_failed" => Ok(HistoryEvent::FlowFailed),
            other => Err(format!("unknown history event: {other}")),
        }
    }
}

/// Append-only audit record. Never mutated or deleted; the authoritative
/// timeline for every job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueHistoryEvent {
    pub id: Uuid,
    pub job_id: Uuid,
    pub directory_name: Option<String>,
    pub event: HistoryEvent,
    pub details: serde_json::Value,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueueHistoryEvent {
    pub fn new(job_id: Uuid, event: HistoryEvent, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            directory_name: None,
            event,
            details,
            worker_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_directory(mut self, directory_name: impl Into<String>) -> Self {
        self.directory_name = Some(directory_name.into());
        self
    }

    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }
}

// ── Worker heartbeats ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Active,
    Idle,
    Stale,
    Stopped,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Stale => "stale",
            WorkerStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(WorkerStatus::Active),
            "idle" => Ok(WorkerStatus::Idle),
            "stale" => Ok(WorkerStatus::Stale),
            "stopped" => Ok(WorkerStatus::Stopped),
            other => Err(format!("unknown worker status: {other}")),
        }
    }
}

/// Liveness record, upserted by each worker on a fixed tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub worker_id: String,
    pub last_seen: DateTime<Utc>,
    pub status: WorkerStatus,
    pub jobs_processed: i64,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_transitions_are_monotonic() {
        assert!(JobStatus::Pending.can_transition(JobStatus::InProgress));
        assert!(JobStatus::InProgress.can_transition(JobStatus::Completed));
        assert!(JobStatus::InProgress.can_transition(JobStatus::Failed));

        // No regressions, no skips, no leaving terminal states.
        assert!(!JobStatus::InProgress.can_transition(JobStatus::Pending));
        assert!(!JobStatus::Pending.can_transition(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition(JobStatus::InProgress));
        assert!(!JobStatus::Completed.can_transition(JobStatus::InProgress));
    }

    #[test]
    fn status_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&ResultStatus::NeedsReview).unwrap(),
            "\"needs_review\""
        );
        assert_eq!(
            serde_json::to_string(&HistoryEvent::SubmissionComplete).unwrap(),
            "\"submission_complete\""
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        for event in [
            HistoryEvent::QueueClaimed,
            HistoryEvent::FlowTriggered,
            HistoryEvent::FlowStarted,
            HistoryEvent::SubmissionComplete,
            HistoryEvent::FlowCompleted,
            HistoryEvent::FlowFailed,
        ] {
            assert_eq!(event.as_str().parse::<HistoryEvent>().unwrap(), event);
        }
    }

    #[test]
    fn new_job_starts_pending() {
        let job = Job::new(Uuid::new_v4(), "cust-1", 5);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn history_event_builder() {
        let job_id = Uuid::new_v4();
        let event = QueueHistoryEvent::new(job_id, HistoryEvent::SubmissionComplete, serde_json::json!({"ok": true}))
            .with_directory("yelp")
            .with_worker("worker-1");
        assert_eq!(event.job_id, job_id);
        assert_eq!(event.directory_name.as_deref(), Some("yelp"));
        assert_eq!(event.worker_id.as_deref(), Some("worker-1"));
    }
}
