//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single
//! `Router`.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::state::AppState;
use crate::{api, doc, live};

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/config", get(api::config_summary))
        .route("/jobs", get(api::list_jobs).post(api::create_job))
        .route("/jobs/{id}", get(api::get_job))
        .route("/jobs/{id}/results", get(api::job_results))
        .route("/jobs/{id}/history", get(api::job_history))
        .route("/workers", get(api::workers))
        .route("/queue/status", get(api::queue_status))
        .route("/plan", post(api::plan))
        .route(
            "/profiles/{customer_id}",
            put(api::upsert_profile).get(api::get_profile),
        )
        .route("/ws", get(live::ws_upgrade))
        .merge(Scalar::with_url("/docs", doc::ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    use super::*;
    use crate::startup::build_app_state;

    async fn test_router() -> Router {
        let config = listpilot_core::Config::for_profile("__UNSET_TEST_PROFILE__");
        let state = build_app_state(config, true).await.unwrap();
        build_router(state)
    }

    #[tokio::test]
    async fn health_reports_ok_in_memory_mode() {
        let router = test_router().await;
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"]["queue"], "ok");
    }

    #[tokio::test]
    async fn create_job_enqueues_and_returns_handles() {
        let router = test_router().await;

        let response = router
            .clone()
            .oneshot(
                Request::post("/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"customer_id": "cust-1", "package_size": 3}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let job_id = json["job_id"].as_str().unwrap().to_string();
        assert!(!json["message_id"].as_str().unwrap().is_empty());

        // The job row is visible on the read surface immediately.
        let response = router
            .oneshot(
                Request::get(format!("/jobs/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["directories_total"], 3);
        assert_eq!(json["directories_done"], 0);
    }

    #[tokio::test]
    async fn zero_package_size_is_rejected() {
        let router = test_router().await;
        let response = router
            .oneshot(
                Request::post("/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"customer_id": "cust-1", "package_size": 0}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn plan_endpoint_returns_heuristic_fill_plan() {
        let router = test_router().await;
        let directory = listpilot_core::directory::DirectoryCatalog::builtin().directories[0].clone();
        let body = serde_json::json!({
            "directory": directory,
            "business_profile": {
                "business_name": "Acme",
                "website": "https://acme.test",
                "email": "hi@acme.test",
            },
        });

        let response = router
            .oneshot(
                Request::post("/plan")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let plan: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(!plan["actions"].as_array().unwrap().is_empty());
        assert_eq!(plan["submit_selector"], "button[type='submit']");
    }

    #[tokio::test]
    async fn unknown_job_is_404() {
        let router = test_router().await;
        let response = router
            .oneshot(
                Request::get(format!("/jobs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
