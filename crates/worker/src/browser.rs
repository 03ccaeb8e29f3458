//! Browser automation seam.
//!
//! One page session runs a submission end-to-end; it is not internally
//! parallelizable, so the trait is a plain sequential command surface.
//! The production implementation drives a headless-browser sidecar over
//! HTTP; tests substitute a mock session.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use listpilot_core::config::BrowserConfig;

use crate::error::WorkerError;

/// A single headless-browser page session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), WorkerError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), WorkerError>;

    async fn click(&self, selector: &str) -> Result<(), WorkerError>;

    /// Visible text of the current page, for outcome classification.
    async fn page_text(&self) -> Result<String, WorkerError>;

    /// PNG screenshot of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, WorkerError>;
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    ok: bool,
    #[serde(default)]
    error_kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// HTTP driver for a headless-browser sidecar.
///
/// Commands are JSON posts to `{base}/command`; screenshots come back as raw
/// PNG bytes from `{base}/screenshot`.
pub struct RemoteBrowser {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteBrowser {
    pub fn new(base_url: impl Into<String>, nav_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(nav_timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(
            config.remote_url.clone(),
            Duration::from_secs(config.nav_timeout_secs),
        )
    }

    async fn command(&self, body: serde_json::Value) -> Result<CommandResponse, WorkerError> {
        let url = format!("{}/command", self.base_url.trim_end_matches('/'));
        debug!(command = %body["action"], "Browser command");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkerError::Navigation(format!("browser command timed out: {e}"))
                } else {
                    WorkerError::Session(format!("browser sidecar unreachable: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(WorkerError::Session(format!(
                "browser sidecar returned status {status}"
            )));
        }

        let parsed: CommandResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::Session(format!("invalid sidecar response: {e}")))?;

        if parsed.ok {
            return Ok(parsed);
        }

        let detail = parsed.error.clone().unwrap_or_else(|| "unknown error".into());
        match parsed.error_kind.as_deref() {
            Some("timeout") => Err(WorkerError::Navigation(detail)),
            Some("not_found") => Err(WorkerError::ElementNotFound(detail)),
            _ => Err(WorkerError::Session(detail)),
        }
    }
}

/// Dev-mode stand-in: no real browser, every submission lands on a
/// success page. Lets the whole pipeline run end-to-end on a laptop
/// (`serve --memory`) with no sidecar.
pub struct SimulatedBrowser;

#[async_trait]
impl BrowserSession for SimulatedBrowser {
    async fn navigate(&self, url: &str) -> Result<(), WorkerError> {
        debug!(url, "Simulated navigation");
        Ok(())
    }

    async fn fill(&self, _selector: &str, _value: &str) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn page_text(&self) -> Result<String, WorkerError> {
        Ok("Thank you for your submission! Your listing is pending review.".into())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, WorkerError> {
        // Minimal PNG header so downstream consumers see image bytes.
        Ok(vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a])
    }
}

#[async_trait]
impl BrowserSession for RemoteBrowser {
    async fn navigate(&self, url: &str) -> Result<(), WorkerError> {
        self.command(json!({"action": "navigate", "url": url}))
            .await
            .map(|_| ())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), WorkerError> {
        self.command(json!({"action": "fill", "selector": selector, "value": value}))
            .await
            .map(|_| ())
    }

    async fn click(&self, selector: &str) -> Result<(), WorkerError> {
        self.command(json!({"action": "click", "selector": selector}))
            .await
            .map(|_| ())
    }

    async fn page_text(&self) -> Result<String, WorkerError> {
        let response = self.command(json!({"action": "text"})).await?;
        Ok(response.text.unwrap_or_default())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, WorkerError> {
        let url = format!("{}/screenshot", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| WorkerError::Session(format!("screenshot request failed: {e}")))?;

        if response.status().as_u16() != 200 {
            return Err(WorkerError::Session(format!(
                "screenshot returned status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkerError::Session(format!("screenshot body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
