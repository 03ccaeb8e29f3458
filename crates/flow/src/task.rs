//! Per-directory submission task.
//!
//! A task is the unit of retry and idempotency: compute the key, short
//! circuit on a prior success, map, submit, and always leave exactly one
//! terminal JobResult row behind — no task-level error ever escapes this
//! boundary, so job-level aggregation always has complete information.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use listpilot_core::directory::Directory;
use listpilot_core::failure::FailureKind;
use listpilot_core::idempotency::idempotency_key;
use listpilot_core::job::{HistoryEvent, JobResult, QueueHistoryEvent, ResultStatus};
use listpilot_core::profile::BusinessProfile;
use listpilot_oracle::client::{FieldMapper, OracleError};
use listpilot_worker::submit::{SubmissionFailure, SubmissionRunner};
use listpilot_worker::outcome::SubmissionOutcome;

use listpilot_store::traits::{HistoryStore, ResultStore, Store};

use crate::retry::{run_retried, RetryPolicy};

/// Shared dependencies for all tasks of one orchestrator.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn Store>,
    pub mapper: Arc<dyn FieldMapper>,
    pub runner: Arc<SubmissionRunner>,
    pub policy: RetryPolicy,
    /// Hard wall-clock ceiling covering all retries of one task.
    pub task_timeout: Duration,
    pub worker_id: String,
}

/// One directory submission within a job.
pub struct DirectoryTask {
    pub job_id: Uuid,
    pub directory: Directory,
    pub profile: BusinessProfile,
}

#[derive(Debug)]
enum AttemptError {
    Oracle(OracleError),
    Submission(SubmissionFailure),
}

impl AttemptError {
    fn kind(&self) -> FailureKind {
        match self {
            // Oracle outages are infra hiccups; mapping rejections are not.
            AttemptError::Oracle(e) if e.is_transient() => FailureKind::TransientInfra,
            AttemptError::Oracle(_) => FailureKind::Structural,
            AttemptError::Submission(f) => f.error.kind(),
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Oracle(e) => write!(f, "oracle: {e}"),
            AttemptError::Submission(e) => write!(f, "submission: {e}"),
        }
    }
}

struct AttemptOutcome {
    status: ResultStatus,
    response_log: serde_json::Value,
    error_message: Option<String>,
}

impl DirectoryTask {
    /// Run the task to a terminal result. Infallible by design: every path
    /// upserts a JobResult row and appends a history event before returning.
    pub async fn run(&self, ctx: &TaskContext) -> ResultStatus {
        let payload = self.profile.to_payload();
        let key = idempotency_key(self.job_id, &self.directory.id, &payload);

        // A prior success under this key makes the whole task a no-op —
        // this is what makes queue redelivery and worker crashes safe.
        match ctx.store.get_by_key(&key).await {
            Ok(Some(existing)) if existing.status == ResultStatus::Submitted => {
                info!(
                    job_id = %self.job_id,
                    directory = %self.directory.id,
                    "Prior successful submission found — skipping"
                );
                self.append_history(ctx, ResultStatus::Submitted, Some("short-circuit: already submitted"))
                    .await;
                return ResultStatus::Submitted;
            }
            Ok(_) => {}
            Err(e) => {
                // The upsert below is idempotent either way.
                warn!(job_id = %self.job_id, directory = %self.directory.id, error = %e, "Idempotency pre-check failed");
            }
        }

        if let Some(delay_ms) = self.directory.rate_limit_ms {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let attempt_chain = run_retried(&ctx.policy, AttemptError::kind, |_attempt| self.attempt(ctx));

        let outcome = match tokio::time::timeout(ctx.task_timeout, attempt_chain).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => {
                let (response_log, message) = match &error {
                    AttemptError::Oracle(e) => (
                        serde_json::json!({ "error": e.to_string() }),
                        e.to_string(),
                    ),
                    AttemptError::Submission(f) => (f.report.response_log(), f.error.to_string()),
                };
                AttemptOutcome {
                    status: ResultStatus::Failed,
                    response_log,
                    error_message: Some(message),
                }
            }
            Err(_elapsed) => AttemptOutcome {
                status: ResultStatus::Failed,
                response_log: serde_json::json!({ "timed_out": true }),
                error_message: Some(format!(
                    "task exceeded its wall-clock ceiling of {}s",
                    ctx.task_timeout.as_secs()
                )),
            },
        };

        let now = Utc::now();
        let result = JobResult {
            id: Uuid::new_v4(),
            job_id: self.job_id,
            directory_name: self.directory.name.clone(),
            status: outcome.status,
            idempotency_key: key,
            payload,
            response_log: outcome.response_log,
            error_message: outcome.error_message.clone(),
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = ctx.store.upsert_result(&result).await {
            warn!(job_id = %self.job_id, directory = %self.directory.id, error = %e, "Failed to upsert job result");
        }

        self.append_history(ctx, outcome.status, outcome.error_message.as_deref())
            .await;
        outcome.status
    }

    async fn attempt(&self, ctx: &TaskContext) -> Result<AttemptOutcome, AttemptError> {
        let plan = ctx
            .mapper
            .plan(&self.directory, &self.profile)
            .await
            .map_err(AttemptError::Oracle)?;

        let report = ctx
            .runner
            .execute(&self.directory, &plan)
            .await
            .map_err(AttemptError::Submission)?;

        let (status, error_message) = match &report.outcome {
            SubmissionOutcome::Submitted => (ResultStatus::Submitted, None),
            SubmissionOutcome::Rejected { reason } => {
                (ResultStatus::Failed, Some(reason.clone()))
            }
            SubmissionOutcome::NeedsReview { reason } => {
                (ResultStatus::NeedsReview, Some(reason.clone()))
            }
        };

        Ok(AttemptOutcome {
            status,
            response_log: report.response_log(),
            error_message,
        })
    }

    async fn append_history(&self, ctx: &TaskContext, status: ResultStatus, detail: Option<&str>) {
        let event = QueueHistoryEvent::new(
            self.job_id,
            HistoryEvent::SubmissionComplete,
            serde_json::json!({
                "status": status.as_str(),
                "detail": detail,
            }),
        )
        .with_directory(self.directory.name.clone())
        .with_worker(ctx.worker_id.clone());

        if let Err(e) = ctx.store.append(&event).await {
            warn!(job_id = %self.job_id, error = %e, "Failed to append history event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use listpilot_core::directory::DirectoryCatalog;
    use listpilot_oracle::client::OracleWithFallback;
    use listpilot_store::{MemoryStore, UpsertOutcome};
    use listpilot_store::traits::{HistoryStore as _, ResultStore as _};
    use listpilot_worker::browser::BrowserSession;
    use listpilot_worker::error::WorkerError;

    use super::*;

    /// Scripted browser for task-level tests.
    struct ScriptedBrowser {
        page: Mutex<String>,
        navigations: AtomicU32,
        mode: Mode,
    }

    enum Mode {
        Normal,
        FailNavigation,
        HangForever,
    }

    impl ScriptedBrowser {
        fn serving(page: &str) -> Self {
            Self {
                page: Mutex::new(page.to_string()),
                navigations: AtomicU32::new(0),
                mode: Mode::Normal,
            }
        }

        fn failing() -> Self {
            Self {
                page: Mutex::new(String::new()),
                navigations: AtomicU32::new(0),
                mode: Mode::FailNavigation,
            }
        }

        fn hanging() -> Self {
            Self {
                page: Mutex::new(String::new()),
                navigations: AtomicU32::new(0),
                mode: Mode::HangForever,
            }
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedBrowser {
        async fn navigate(&self, _url: &str) -> Result<(), WorkerError> {
            self.navigations.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Normal => Ok(()),
                Mode::FailNavigation => Err(WorkerError::Navigation("timed out".into())),
                Mode::HangForever => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }

        async fn fill(&self, _selector: &str, _value: &str) -> Result<(), WorkerError> {
            Ok(())
        }

        async fn click(&self, _selector: &str) -> Result<(), WorkerError> {
            Ok(())
        }

        async fn page_text(&self) -> Result<String, WorkerError> {
            Ok(self.page.lock().unwrap().clone())
        }

        async fn screenshot(&self) -> Result<Vec<u8>, WorkerError> {
            Ok(vec![1, 2, 3])
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            cap: Duration::from_millis(4),
            jitter: 0.25,
        }
    }

    fn context(store: Arc<MemoryStore>, browser: Arc<ScriptedBrowser>) -> TaskContext {
        TaskContext {
            store,
            mapper: Arc::new(OracleWithFallback::new(None)),
            runner: Arc::new(SubmissionRunner::new(browser, None)),
            policy: fast_policy(),
            task_timeout: Duration::from_secs(30),
            worker_id: "test-worker".into(),
        }
    }

    fn task() -> DirectoryTask {
        let directory = DirectoryCatalog::builtin()
            .directories
            .iter()
            .find(|d| !d.captcha && d.rate_limit_ms.is_none())
            .cloned()
            .unwrap();
        DirectoryTask {
            job_id: Uuid::new_v4(),
            directory,
            profile: BusinessProfile {
                business_name: "Acme".into(),
                website: "https://acme.test".into(),
                email: "hi@acme.test".into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn success_upserts_submitted_row_and_history() {
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(ScriptedBrowser::serving("Thank you for your submission!"));
        let ctx = context(store.clone(), browser);
        let task = task();

        let status = task.run(&ctx).await;

        assert_eq!(status, ResultStatus::Submitted);
        let results = store.results_for_job(task.job_id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ResultStatus::Submitted);
        assert!(!results[0].payload.as_object().unwrap().is_empty());

        let history = store.events_for_job(task.job_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event, HistoryEvent::SubmissionComplete);
        assert_eq!(history[0].worker_id.as_deref(), Some("test-worker"));
    }

    #[tokio::test]
    async fn prior_success_short_circuits_without_touching_the_browser() {
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(ScriptedBrowser::failing());
        let ctx = context(store.clone(), browser.clone());
        let task = task();

        // Seed the terminal-success row a previous delivery produced.
        let payload = task.profile.to_payload();
        let key = idempotency_key(task.job_id, &task.directory.id, &payload);
        let now = Utc::now();
        let outcome = store
            .upsert_result(&JobResult {
                id: Uuid::new_v4(),
                job_id: task.job_id,
                directory_name: task.directory.name.clone(),
                status: ResultStatus::Submitted,
                idempotency_key: key,
                payload,
                response_log: serde_json::json!([]),
                error_message: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Applied);

        let status = task.run(&ctx).await;

        assert_eq!(status, ResultStatus::Submitted);
        assert_eq!(browser.navigations.load(Ordering::SeqCst), 0);
        assert_eq!(store.results_for_job(task.job_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn structural_rejection_fails_without_retry() {
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(ScriptedBrowser::serving("This listing already exists."));
        let ctx = context(store.clone(), browser.clone());
        let task = task();

        let status = task.run(&ctx).await;

        assert_eq!(status, ResultStatus::Failed);
        assert_eq!(browser.navigations.load(Ordering::SeqCst), 1);
        let results = store.results_for_job(task.job_id).await.unwrap();
        assert!(results[0].error_message.as_ref().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn transient_failures_retry_then_record_failed() {
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(ScriptedBrowser::failing());
        let ctx = context(store.clone(), browser.clone());
        let task = task();

        let status = task.run(&ctx).await;

        assert_eq!(status, ResultStatus::Failed);
        assert_eq!(browser.navigations.load(Ordering::SeqCst), 3);
        // Even the failed chain leaves a terminal row with the audit log.
        let results = store.results_for_job(task.job_id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ResultStatus::Failed);
    }

    #[tokio::test]
    async fn wall_clock_ceiling_fails_instead_of_hanging() {
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(ScriptedBrowser::hanging());
        let mut ctx = context(store.clone(), browser);
        ctx.task_timeout = Duration::from_millis(50);
        let task = task();

        let status = task.run(&ctx).await;

        assert_eq!(status, ResultStatus::Failed);
        let results = store.results_for_job(task.job_id).await.unwrap();
        assert!(results[0]
            .error_message
            .as_ref()
            .unwrap()
            .contains("wall-clock ceiling"));
    }
}
