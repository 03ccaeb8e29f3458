//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("message parse error: {0}")]
    Parse(String),

    /// Required fields missing or malformed. Callers drop the message —
    /// redelivery cannot fix bad input.
    #[error("invalid submission order: {0}")]
    Validation(String),

    #[error("acknowledge error: {0}")]
    Ack(String),

    #[error("enqueue error: {0}")]
    Publish(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("queue not found: {0}")]
    NotFound(String),

    #[error("provider error: {0}")]
    Provider(String),
}
