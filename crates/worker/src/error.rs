//! Worker error types, mapped onto the shared failure taxonomy.

use listpilot_core::failure::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Page navigation failed or timed out. Transient.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The browser sidecar itself is unreachable. Transient infra.
    #[error("browser session error: {0}")]
    Session(String),

    /// A selector from the fill plan did not match the page. The form shape
    /// changed — deterministic until the mapping is relearned.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Captcha solver outage or rejection. Transient.
    #[error("captcha solver error: {0}")]
    Captcha(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl WorkerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkerError::Navigation(_) => FailureKind::TransientAutomation,
            WorkerError::Session(_) => FailureKind::TransientInfra,
            WorkerError::ElementNotFound(_) => FailureKind::Structural,
            WorkerError::Captcha(_) => FailureKind::TransientAutomation,
            WorkerError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    FailureKind::TransientInfra
                } else {
                    FailureKind::Structural
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(
            WorkerError::Navigation("timeout".into()).kind(),
            FailureKind::TransientAutomation
        );
        assert_eq!(
            WorkerError::Session("connection refused".into()).kind(),
            FailureKind::TransientInfra
        );
        assert_eq!(
            WorkerError::ElementNotFound("#submit".into()).kind(),
            FailureKind::Structural
        );
        assert!(WorkerError::Captcha("solver 502".into()).kind().is_retryable());
    }
}
