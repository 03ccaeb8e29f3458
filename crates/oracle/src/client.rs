//! Field-mapping oracle clients.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use listpilot_core::config::OracleConfig;
use listpilot_core::directory::Directory;
use listpilot_core::profile::BusinessProfile;

use crate::heuristic::HeuristicMapper;
use crate::types::FillPlan;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 5xx from the mapping service — transient, callers retry.
    #[error("oracle unavailable: status {status}")]
    Unavailable { status: u16 },

    #[error("oracle API error: {status} — {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse oracle response: {0}")]
    Parse(String),

    #[error("oracle not configured")]
    NotConfigured,
}

impl OracleError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Unavailable { .. } => true,
            OracleError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Trait for fill-plan producers — each backend implements this.
#[async_trait]
pub trait FieldMapper: Send + Sync {
    /// Map a business profile onto a directory's form shape.
    async fn plan(
        &self,
        directory: &Directory,
        profile: &BusinessProfile,
    ) -> Result<FillPlan, OracleError>;
}

/// HTTP client for the mapping service: `POST {base}/plan`.
pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let base_url = config.base_url.clone().ok_or(OracleError::NotConfigured)?;
        Ok(Self::new(base_url, Duration::from_secs(config.timeout_secs)))
    }
}

#[async_trait]
impl FieldMapper for HttpOracle {
    async fn plan(
        &self,
        directory: &Directory,
        profile: &BusinessProfile,
    ) -> Result<FillPlan, OracleError> {
        let url = format!("{}/plan", self.base_url.trim_end_matches('/'));
        debug!(directory = %directory.id, "Requesting fill plan from oracle");

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "directory": directory,
                "business_profile": profile,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if (500..600).contains(&status) {
            return Err(OracleError::Unavailable { status });
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api { status, body });
        }

        let plan: FillPlan = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;
        Ok(plan)
    }
}

/// Learned mapping when available, heuristic when not.
///
/// Transient outages propagate so the task retry policy handles them;
/// anything the service deterministically rejects degrades to the
/// best-effort heuristic plan, so the pipeline still attempts the
/// submission instead of giving up on the mapping.
pub struct OracleWithFallback {
    remote: Option<HttpOracle>,
}

impl OracleWithFallback {
    pub fn new(remote: Option<HttpOracle>) -> Self {
        Self { remote }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        let remote = match HttpOracle::from_config(config) {
            Ok(client) => Some(client),
            Err(_) => None,
        };
        Self { remote }
    }
}

#[async_trait]
impl FieldMapper for OracleWithFallback {
    async fn plan(
        &self,
        directory: &Directory,
        profile: &BusinessProfile,
    ) -> Result<FillPlan, OracleError> {
        match &self.remote {
            Some(remote) => match remote.plan(directory, profile).await {
                Ok(plan) => Ok(plan),
                // Transient outages propagate so the task's retry policy
                // gets its chance first; the task falls back after that.
                Err(e) if e.is_transient() => Err(e),
                Err(e) => {
                    warn!(directory = %directory.id, error = %e, "Oracle rejected mapping request — using heuristic plan");
                    Ok(HeuristicMapper::plan(directory, profile))
                }
            },
            None => Ok(HeuristicMapper::plan(directory, profile)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listpilot_core::directory::DirectoryCatalog;

    fn profile() -> BusinessProfile {
        BusinessProfile {
            business_name: "Acme".into(),
            website: "https://acme.test".into(),
            email: "hi@acme.test".into(),
            ..Default::default()
        }
    }

    #[test]
    fn unavailable_is_transient_api_is_not() {
        assert!(OracleError::Unavailable { status: 503 }.is_transient());
        assert!(!OracleError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!OracleError::NotConfigured.is_transient());
    }

    #[test]
    fn from_config_requires_base_url() {
        let config = OracleConfig {
            base_url: None,
            timeout_secs: 5,
        };
        assert!(matches!(
            HttpOracle::from_config(&config),
            Err(OracleError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn fallback_without_remote_uses_heuristic() {
        let mapper = OracleWithFallback::new(None);
        let dir = DirectoryCatalog::builtin().directories[0].clone();
        let plan = mapper.plan(&dir, &profile()).await.unwrap();
        assert!(!plan.actions.is_empty());
        assert_eq!(plan.submit_selector, dir.submit_selector);
    }
}
