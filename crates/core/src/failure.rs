//! Failure taxonomy shared by the worker and the orchestrator.
//!
//! Every error produced inside a directory task maps to exactly one of these
//! classes, which decides whether the task retries, records a failure, or
//! escalates to manual review.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed input. Dropped, never retried — retry cannot fix bad input.
    Validation,
    /// Queue/oracle/network hiccup. Retried with backoff.
    TransientInfra,
    /// Page timeout, captcha-service outage. Retried within the task policy.
    TransientAutomation,
    /// Deterministic rejection by the target site. Recorded failed, not retried.
    Structural,
    /// Automation cannot classify the result. Recorded for manual review.
    Ambiguous,
    /// Process-level crash. Recovered via queue redelivery plus idempotency.
    Fatal,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::TransientInfra | FailureKind::TransientAutomation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::TransientInfra => "transient_infra",
            FailureKind::TransientAutomation => "transient_automation",
            FailureKind::Structural => "structural",
            FailureKind::Ambiguous => "ambiguous",
            FailureKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
