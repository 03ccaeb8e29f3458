//! Per-job state machine: Pending → Running → {Completed, Failed}.
//!
//! `start_job` is the fire-and-forget trigger: it claims the job, spawns the
//! per-directory fan-out in the background, and returns a handle
//! immediately. Progress is observed through the result store, never by
//! blocking the triggering caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use listpilot_core::config::FlowConfig;
use listpilot_core::directory::{Directory, DirectoryCatalog};
use listpilot_core::job::{HistoryEvent, Job, JobStatus, QueueHistoryEvent, ResultStatus};
use listpilot_core::profile::BusinessProfile;
use listpilot_oracle::client::FieldMapper;
use listpilot_store::traits::{HistoryStore, JobStore, ProfileStore, ResultStore, Store};
use listpilot_worker::submit::SubmissionRunner;

use crate::error::FlowError;
use crate::retry::RetryPolicy;
use crate::task::{DirectoryTask, TaskContext};

/// Returned synchronously by the trigger; execution continues in the
/// background.
#[derive(Debug, Clone, Copy)]
pub struct JobHandle {
    pub job_id: Uuid,
    /// False when the trigger was a redelivery no-op.
    pub newly_started: bool,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    mapper: Arc<dyn FieldMapper>,
    runner: Arc<SubmissionRunner>,
    catalog: DirectoryCatalog,
    config: FlowConfig,
    worker_id: String,
    /// Global concurrency cap across all jobs on this worker.
    task_slots: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        mapper: Arc<dyn FieldMapper>,
        runner: Arc<SubmissionRunner>,
        catalog: DirectoryCatalog,
        config: FlowConfig,
        worker_id: String,
    ) -> Self {
        let task_slots = Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1)));
        Self {
            store,
            mapper,
            runner,
            catalog,
            config,
            worker_id,
            task_slots,
        }
    }

    /// Trigger a job. Idempotent: a second trigger for the same job (e.g.
    /// from queue redelivery) is a no-op when the job is already running or
    /// finished.
    pub async fn start_job(&self, job_id: Uuid) -> Result<JobHandle, FlowError> {
        let claimed = self.store.mark_in_progress(job_id).await?;
        if !claimed {
            info!(job_id = %job_id, "Job already started — trigger is a no-op");
            return Ok(JobHandle {
                job_id,
                newly_started: false,
            });
        }

        self.append_event(job_id, HistoryEvent::FlowStarted, serde_json::json!({}))
            .await;

        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(FlowError::JobMissing(job_id))?;

        // Failures past the claim are handled here, not surfaced to the
        // subscriber: redelivery could not re-claim the job anyway.
        let profile = match self.store.fetch_profile(&job.customer_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                let message = format!("no business profile for customer {}", job.customer_id);
                error!(job_id = %job_id, "{}", message);
                self.fail_job(job_id, &message).await;
                return Ok(JobHandle {
                    job_id,
                    newly_started: true,
                });
            }
            Err(e) => {
                let message = format!("profile lookup failed: {e}");
                error!(job_id = %job_id, "{}", message);
                self.fail_job(job_id, &message).await;
                return Ok(JobHandle {
                    job_id,
                    newly_started: true,
                });
            }
        };

        let directories = self.catalog.take(job.package_size.max(0) as usize);

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_flow(job, profile, directories).await;
        });

        Ok(JobHandle {
            job_id,
            newly_started: true,
        })
    }

    /// Fan out one task per directory, update progress as tasks settle,
    /// finalize when all have settled.
    async fn run_flow(&self, job: Job, profile: BusinessProfile, directories: Vec<Directory>) {
        let job_id = job.id;
        let total = directories.len();

        if total == 0 {
            self.fail_job(job_id, "no directories available for this package")
                .await;
            return;
        }

        info!(
            job_id = %job_id,
            directories = total,
            concurrency = self.config.max_concurrent_tasks,
            "Job flow started"
        );

        let ctx = TaskContext {
            store: self.store.clone(),
            mapper: self.mapper.clone(),
            runner: self.runner.clone(),
            policy: RetryPolicy::from_config(&self.config),
            task_timeout: Duration::from_secs(self.config.task_timeout_secs),
            worker_id: self.worker_id.clone(),
        };

        let mut join_set = JoinSet::new();
        for directory in directories {
            let ctx = ctx.clone();
            let slots = self.task_slots.clone();
            let task = DirectoryTask {
                job_id,
                directory,
                profile: profile.clone(),
            };
            join_set.spawn(async move {
                // Closed-semaphore errors cannot happen: the semaphore lives
                // as long as the orchestrator.
                let _permit = slots.acquire_owned().await;
                task.run(&ctx).await
            });
        }

        let mut settled = 0usize;
        let mut succeeded = 0usize;
        while let Some(joined) = join_set.join_next().await {
            settled += 1;
            match joined {
                Ok(ResultStatus::Submitted) => succeeded += 1,
                Ok(_) => {}
                Err(e) => {
                    // A panicked task still counts as settled: the job must
                    // converge regardless.
                    warn!(job_id = %job_id, error = %e, "Directory task panicked");
                }
            }

            let progress = (settled * 100 / total) as i32;
            if let Err(e) = self.store.update_progress(job_id, progress).await {
                warn!(job_id = %job_id, error = %e, "Failed to update progress");
            }
        }

        self.finalize(job_id, succeeded, settled).await;
    }

    /// Terminal aggregation. Partial success is success: individual
    /// directory failures never fail the job by themselves — the threshold
    /// is an explicit policy knob.
    async fn finalize(&self, job_id: Uuid, succeeded: usize, total: usize) {
        let ratio = if total == 0 {
            0.0
        } else {
            succeeded as f64 / total as f64
        };
        let completed = succeeded > 0 && ratio >= self.config.min_success_ratio;

        let details = serde_json::json!({
            "succeeded": succeeded,
            "failed": total - succeeded,
            "total": total,
        });

        if completed {
            match self.store.finalize(job_id, JobStatus::Completed, None).await {
                Ok(true) => {
                    info!(job_id = %job_id, succeeded, total, "Job completed");
                    self.append_event(job_id, HistoryEvent::FlowCompleted, details)
                        .await;
                }
                Ok(false) => warn!(job_id = %job_id, "Job was already finalized"),
                Err(e) => error!(job_id = %job_id, error = %e, "Failed to finalize job"),
            }
        } else {
            let message = format!("{succeeded} of {total} directory submissions succeeded");
            match self
                .store
                .finalize(job_id, JobStatus::Failed, Some(&message))
                .await
            {
                Ok(true) => {
                    warn!(job_id = %job_id, succeeded, total, "Job failed");
                    self.append_event(job_id, HistoryEvent::FlowFailed, details)
                        .await;
                }
                Ok(false) => warn!(job_id = %job_id, "Job was already finalized"),
                Err(e) => error!(job_id = %job_id, error = %e, "Failed to finalize job"),
            }
        }
    }

    async fn fail_job(&self, job_id: Uuid, message: &str) {
        if let Err(e) = self
            .store
            .finalize(job_id, JobStatus::Failed, Some(message))
            .await
        {
            error!(job_id = %job_id, error = %e, "Failed to mark job failed");
        }
        self.append_event(
            job_id,
            HistoryEvent::FlowFailed,
            serde_json::json!({ "error": message }),
        )
        .await;
    }

    async fn append_event(&self, job_id: Uuid, event: HistoryEvent, details: serde_json::Value) {
        let record =
            QueueHistoryEvent::new(job_id, event, details).with_worker(self.worker_id.clone());
        if let Err(e) = self.store.append(&record).await {
            warn!(job_id = %job_id, event = %event, error = %e, "Failed to append history event");
        }
    }
}
