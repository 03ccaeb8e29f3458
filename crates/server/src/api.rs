//! HTTP handlers: health, job submission/read surface, fill-plan oracle,
//! profiles, and queue status.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use listpilot_core::directory::Directory;
use listpilot_core::job::{Job, JobResult, QueueHistoryEvent, WorkerHeartbeat};
use listpilot_core::profile::BusinessProfile;
use listpilot_oracle::heuristic::HeuristicMapper;
use listpilot_oracle::types::FillPlan;
use listpilot_store::traits::{
    HeartbeatStore, HistoryStore, JobStore, ProfileStore, ResultStore,
};

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn not_found(what: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{what} not found"),
        }),
    )
}

// ── Health ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    /// healthy | degraded | unhealthy
    pub status: &'static str,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    /// ok | error
    pub queue: &'static str,
    /// ok | missing
    pub config: &'static str,
    /// ok | missing
    pub auth: &'static str,
}

/// Overall process health for ops tooling.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Health status with per-dependency checks"))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let queue_ok = state.consumer.health_check().await.is_ok();
    let config_ok = state.memory_mode || state.config.postgres.is_configured();
    let auth_ok = state.memory_mode || state.config.aws.is_configured();

    let status = if !queue_ok {
        "unhealthy"
    } else if config_ok && auth_ok {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        checks: HealthChecks {
            queue: if queue_ok { "ok" } else { "error" },
            config: if config_ok { "ok" } else { "missing" },
            auth: if auth_ok { "ok" } else { "missing" },
        },
    })
}

/// Redacted runtime configuration.
#[utoipa::path(
    get,
    path = "/config",
    tag = "Health",
    responses((status = 200, description = "Redacted configuration summary"))
)]
pub async fn config_summary(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.config.redacted_summary())
}

// ── Jobs ──────────────────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct CreateJobRequest {
    pub customer_id: String,
    pub package_size: u32,
    #[serde(default)]
    pub priority: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    /// Queue delivery handle for the enqueued order.
    pub message_id: String,
}

/// Create a job row and enqueue the submission order.
#[utoipa::path(
    post,
    path = "/jobs",
    tag = "Jobs",
    responses(
        (status = 201, description = "Job created and order enqueued"),
        (status = 400, description = "Invalid request"),
        (status = 502, description = "Queue unavailable"),
    )
)]
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    if request.package_size == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "package_size must be >= 1".into(),
            }),
        ));
    }

    // The job row exists from enqueue time; the subscriber claims it later.
    let job = Job::new(Uuid::new_v4(), request.customer_id.clone(), request.package_size as i32);
    state.store.create_job(&job).await.map_err(internal)?;

    let order = serde_json::json!({
        "job_id": job.id,
        "customer_id": request.customer_id,
        "package_size": request.package_size,
        "priority": request.priority.unwrap_or_else(|| "normal".into()),
        "created_at": Utc::now().to_rfc3339(),
        "source": "gateway",
    });

    let message_id = state
        .publisher
        .enqueue(&order.to_string())
        .await
        .map_err(|e| {
            warn!(job_id = %job.id, error = %e, "Failed to enqueue submission order");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: format!("enqueue failed: {e}"),
                }),
            )
        })?;

    info!(job_id = %job.id, message_id = %message_id, "Submission order enqueued");
    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            job_id: job.id,
            message_id,
        }),
    ))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Most recent jobs.
#[utoipa::path(
    get,
    path = "/jobs",
    tag = "Jobs",
    responses((status = 200, description = "Recent jobs, newest first"))
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let jobs = state
        .store
        .list_jobs(query.limit.clamp(1, 500))
        .await
        .map_err(internal)?;
    Ok(Json(jobs))
}

#[derive(Serialize)]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub job: Job,
    pub directories_total: i32,
    pub directories_done: i64,
    pub directories_submitted: i64,
}

/// One job with its aggregate result counts.
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "Jobs",
    responses(
        (status = 200, description = "Job detail"),
        (status = 404, description = "Unknown job"),
    )
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetailResponse>, ApiError> {
    let job = state
        .store
        .get_job(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("job {id}")))?;

    let counts = state.store.count_by_status(id).await.map_err(internal)?;
    Ok(Json(JobDetailResponse {
        directories_total: job.package_size,
        directories_done: counts.total(),
        directories_submitted: counts.submitted,
        job,
    }))
}

/// Per-directory results for a job.
#[utoipa::path(
    get,
    path = "/jobs/{id}/results",
    tag = "Jobs",
    responses((status = 200, description = "Per-directory outcome rows"))
)]
pub async fn job_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<JobResult>>, ApiError> {
    let results = state.store.results_for_job(id).await.map_err(internal)?;
    Ok(Json(results))
}

/// Chronological audit trail for a job.
#[utoipa::path(
    get,
    path = "/jobs/{id}/history",
    tag = "Jobs",
    responses((status = 200, description = "Audit events in chronological order"))
)]
pub async fn job_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<QueueHistoryEvent>>, ApiError> {
    let events = state.store.events_for_job(id).await.map_err(internal)?;
    Ok(Json(events))
}

// ── Workers & queue ───────────────────────────────────────────

/// Worker liveness registry.
#[utoipa::path(
    get,
    path = "/workers",
    tag = "Workers",
    responses((status = 200, description = "Known workers with last-seen timestamps"))
)]
pub async fn workers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WorkerHeartbeat>>, ApiError> {
    let workers = state.store.list_workers().await.map_err(internal)?;
    Ok(Json(workers))
}

#[derive(Serialize)]
pub struct QueueStatusResponse {
    pub connected: bool,
    pub provider: String,
    pub approximate_depth: Option<u64>,
    pub dlq_depth: Option<u64>,
}

/// Main-queue and DLQ depth.
#[utoipa::path(
    get,
    path = "/queue/status",
    tag = "Workers",
    responses((status = 200, description = "Queue connectivity and depths"))
)]
pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStatusResponse> {
    let health = state.consumer.health_check().await;
    let dlq_depth = state.consumer.dlq_depth().await.unwrap_or(None);

    match health {
        Ok(health) => Json(QueueStatusResponse {
            connected: health.connected,
            provider: health.provider,
            approximate_depth: health.approximate_message_count,
            dlq_depth,
        }),
        Err(e) => {
            warn!(error = %e, "Queue health check failed");
            Json(QueueStatusResponse {
                connected: false,
                provider: "unknown".into(),
                approximate_depth: None,
                dlq_depth,
            })
        }
    }
}

// ── Oracle ────────────────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct PlanRequest {
    pub directory: Directory,
    pub business_profile: BusinessProfile,
}

/// Produce a fill plan for a directory form. Degrades gracefully: without a
/// learned mapping this is the best-effort heuristic, never an error.
#[utoipa::path(
    post,
    path = "/plan",
    tag = "Oracle",
    responses((status = 200, description = "Ordered fill actions, submit action, and known obstacles"))
)]
pub async fn plan(Json(request): Json<PlanRequest>) -> Json<FillPlan> {
    Json(HeuristicMapper::plan(&request.directory, &request.business_profile))
}

// ── Profiles ──────────────────────────────────────────────────

/// Store the business profile submitted for a customer's jobs.
#[utoipa::path(
    put,
    path = "/profiles/{customer_id}",
    tag = "Profiles",
    responses((status = 204, description = "Profile stored"))
)]
pub async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
    Json(profile): Json<BusinessProfile>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .upsert_profile(&customer_id, &profile)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a stored business profile.
#[utoipa::path(
    get,
    path = "/profiles/{customer_id}",
    tag = "Profiles",
    responses(
        (status = 200, description = "Stored profile"),
        (status = 404, description = "Unknown customer"),
    )
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<Json<BusinessProfile>, ApiError> {
    let profile = state
        .store
        .fetch_profile(&customer_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("profile for customer {customer_id}")))?;
    Ok(Json(profile))
}
