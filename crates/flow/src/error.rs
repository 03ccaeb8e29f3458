//! Orchestration error types.

use thiserror::Error;
use uuid::Uuid;

use listpilot_core::failure::FailureKind;
use listpilot_oracle::client::OracleError;
use listpilot_queue::error::QueueError;
use listpilot_store::error::StoreError;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("job {0} not found")]
    JobMissing(Uuid),

    #[error("no business profile for customer {0}")]
    ProfileMissing(String),
}

impl FlowError {
    pub fn kind(&self) -> FailureKind {
        match self {
            // The store and queue are infrastructure: hiccups retry.
            FlowError::Store(_) | FlowError::Queue(_) => FailureKind::TransientInfra,
            FlowError::Oracle(e) if e.is_transient() => FailureKind::TransientInfra,
            FlowError::Oracle(_) => FailureKind::Structural,
            FlowError::JobMissing(_) | FlowError::ProfileMissing(_) => FailureKind::Validation,
        }
    }
}
