//! Queue consumer/publisher traits and message types.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// A raw message received from a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique message identifier from the queue provider.
    pub id: String,
    /// Raw message body (JSON string).
    pub body: String,
    /// Provider-specific handle for ack/nack (e.g., SQS receipt handle).
    pub receipt_handle: String,
    /// When the message was sent to the queue.
    pub timestamp: DateTime<Utc>,
    /// How many times this message has been delivered. Drives DLQ routing.
    pub attempt_count: u32,
}

/// Health status of a queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Whether the queue is reachable.
    pub connected: bool,
    /// Approximate number of messages waiting in the queue.
    pub approximate_message_count: Option<u64>,
    /// Queue provider name (e.g., "sqs", "memory").
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, messages: {:?}, provider: {} }}",
            self.connected, self.approximate_message_count, self.provider
        )
    }
}

/// Consumer side of a durable queue with at-least-once delivery.
///
/// A received message is invisible to other consumers until acked or its
/// visibility timeout elapses, at which point it reappears. Implementations
/// route messages to a dead-letter queue once the redelivery budget is
/// exhausted. Every downstream effect must therefore be idempotent:
/// redelivery can happen for reasons unrelated to true failure (lost ack,
/// network partition, crashed consumer).
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Poll up to `max_messages` from the queue.
    ///
    /// May block for up to the provider's long-poll timeout (e.g., 20s for
    /// SQS). Returns an empty vec if no messages are available.
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge successful processing — removes the message from the queue.
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Negative-acknowledge — returns the message to the queue immediately.
    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Check queue connectivity and return health status.
    async fn health_check(&self) -> Result<QueueHealth, QueueError>;

    /// Approximate depth of the dead-letter queue (if configured).
    async fn dlq_depth(&self) -> Result<Option<u64>, QueueError> {
        Ok(None) // Default: DLQ not supported
    }
}

/// Publisher side: enqueue a message, receiving the provider's delivery
/// handle (message id) back.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn enqueue(&self, body: &str) -> Result<String, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_message_serde_roundtrip() {
        let msg = QueueMessage {
            id: "msg-123".to_string(),
            body: r#"{"job_id":"a","customer_id":"c","package_size":5}"#.to_string(),
            receipt_handle: "handle-abc".to_string(),
            timestamp: Utc::now(),
            attempt_count: 2,
        };

        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: QueueMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(msg.id, deserialized.id);
        assert_eq!(msg.body, deserialized.body);
        assert_eq!(msg.receipt_handle, deserialized.receipt_handle);
        assert_eq!(msg.attempt_count, deserialized.attempt_count);
    }

    #[test]
    fn queue_health_display() {
        let health = QueueHealth {
            connected: true,
            approximate_message_count: Some(7),
            provider: "memory".to_string(),
        };
        let display = format!("{}", health);
        assert!(display.contains("connected: true"));
        assert!(display.contains("memory"));
    }
}
