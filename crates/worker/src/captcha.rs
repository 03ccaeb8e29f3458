//! CAPTCHA forwarding to an external solver service.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use listpilot_core::config::BrowserConfig;

use crate::error::WorkerError;

#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Forward a challenge and return the solved token.
    async fn solve(&self, page_url: &str, site_key: Option<&str>) -> Result<String, WorkerError>;
}

#[derive(Debug, Deserialize)]
struct SolveResponse {
    token: String,
}

/// HTTP client for an external solving service.
pub struct HttpCaptchaSolver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCaptchaSolver {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Option<Self> {
        match (&config.captcha_solver_url, &config.captcha_api_key) {
            (Some(url), Some(key)) => Some(Self::new(url.clone(), key.clone())),
            _ => None,
        }
    }
}

#[async_trait]
impl CaptchaSolver for HttpCaptchaSolver {
    async fn solve(&self, page_url: &str, site_key: Option<&str>) -> Result<String, WorkerError> {
        let url = format!("{}/solve", self.base_url.trim_end_matches('/'));
        debug!(page_url, "Forwarding CAPTCHA to solver");

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "api_key": self.api_key,
                "url": page_url,
                "site_key": site_key,
            }))
            .send()
            .await
            .map_err(|e| WorkerError::Captcha(format!("solver unreachable: {e}")))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(WorkerError::Captcha(format!("solver returned status {status}")));
        }

        let parsed: SolveResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::Captcha(format!("invalid solver response: {e}")))?;
        Ok(parsed.token)
    }
}
