//! OpenAPI documentation aggregator.
//!
//! Collects all `#[utoipa::path]`-annotated handlers into a single OpenAPI
//! spec, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "listpilot API",
        version = "0.1.0",
        description = "Queue-driven business-directory submission pipeline: jobs fan out into idempotent, browser-automated per-directory submissions.",
    ),
    tags(
        (name = "Health", description = "Process health and configuration"),
        (name = "Jobs", description = "Submission jobs, per-directory results, and the audit trail"),
        (name = "Workers", description = "Worker heartbeats and queue status"),
        (name = "Oracle", description = "Field-mapping fill plans"),
        (name = "Profiles", description = "Business profile snapshots"),
    ),
    paths(
        crate::api::health,
        crate::api::config_summary,
        crate::api::create_job,
        crate::api::list_jobs,
        crate::api::get_job,
        crate::api::job_results,
        crate::api::job_history,
        crate::api::workers,
        crate::api::queue_status,
        crate::api::plan,
        crate::api::upsert_profile,
        crate::api::get_profile,
    ),
)]
pub struct ApiDoc;
