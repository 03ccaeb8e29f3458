//! In-process queue backend with SQS-equivalent delivery semantics.
//!
//! Used by tests and the `--memory` dev mode. Deliveries are at-least-once:
//! a polled message stays invisible until acked or its visibility timeout
//! elapses, then reappears with an incremented attempt count. Once the
//! attempt count exceeds the configured max receive count the message is
//! routed to an internal dead-letter queue and never redelivered.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::consumer::{QueueConsumer, QueueHealth, QueueMessage, QueuePublisher};
use crate::error::QueueError;

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
    enqueued_at: DateTime<Utc>,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: StoredMessage,
    invisible_until: Instant,
}

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<String, InFlight>,
    dlq: Vec<StoredMessage>,
}

/// In-memory queue with visibility timeouts and DLQ routing.
pub struct MemoryQueue {
    state: Mutex<State>,
    visibility_timeout: Duration,
    max_receive_count: u32,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration, max_receive_count: u32) -> Self {
        Self {
            state: Mutex::new(State::default()),
            visibility_timeout,
            max_receive_count: max_receive_count.max(1),
        }
    }

    /// Return expired in-flight deliveries to the ready queue.
    fn reap_expired(state: &mut State) {
        let now = Instant::now();
        let expired: Vec<String> = state
            .in_flight
            .iter()
            .filter(|(_, f)| f.invisible_until <= now)
            .map(|(handle, _)| handle.clone())
            .collect();
        for handle in expired {
            if let Some(flight) = state.in_flight.remove(&handle) {
                state.ready.push_back(flight.message);
            }
        }
    }

    /// Snapshot of the dead-letter queue bodies, for triage and tests.
    pub fn dlq_bodies(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.dlq.iter().map(|m| m.body.clone()).collect()
    }
}

#[async_trait]
impl QueuePublisher for MemoryQueue {
    async fn enqueue(&self, body: &str) -> Result<String, QueueError> {
        let id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().unwrap();
        state.ready.push_back(StoredMessage {
            id: id.clone(),
            body: body.to_string(),
            enqueued_at: Utc::now(),
            receive_count: 0,
        });
        Ok(id)
    }
}

#[async_trait]
impl QueueConsumer for MemoryQueue {
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        let mut state = self.state.lock().unwrap();
        Self::reap_expired(&mut state);

        let mut messages = Vec::new();
        while messages.len() < max_messages as usize {
            let Some(mut stored) = state.ready.pop_front() else {
                break;
            };
            stored.receive_count += 1;

            // Redelivery budget exhausted: route to the DLQ instead of
            // delivering again.
            if stored.receive_count > self.max_receive_count {
                tracing::warn!(message_id = %stored.id, receives = stored.receive_count, "Message exceeded redelivery budget — moved to DLQ");
                state.dlq.push(stored);
                continue;
            }

            let receipt_handle = Uuid::new_v4().to_string();
            messages.push(QueueMessage {
                id: stored.id.clone(),
                body: stored.body.clone(),
                receipt_handle: receipt_handle.clone(),
                timestamp: stored.enqueued_at,
                attempt_count: stored.receive_count,
            });
            state.in_flight.insert(
                receipt_handle,
                InFlight {
                    message: stored,
                    invisible_until: Instant::now() + self.visibility_timeout,
                },
            );
        }

        Ok(messages)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::Ack(format!("unknown receipt handle: {receipt_handle}")))
    }

    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        match state.in_flight.remove(receipt_handle) {
            Some(flight) => {
                state.ready.push_front(flight.message);
                Ok(())
            }
            None => Err(QueueError::Ack(format!(
                "unknown receipt handle: {receipt_handle}"
            ))),
        }
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let state = self.state.lock().unwrap();
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: Some(state.ready.len() as u64),
            provider: "memory".to_string(),
        })
    }

    async fn dlq_depth(&self) -> Result<Option<u64>, QueueError> {
        let state = self.state.lock().unwrap();
        Ok(Some(state.dlq.len() as u64))
    }
}
