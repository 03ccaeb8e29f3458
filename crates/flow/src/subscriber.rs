//! Queue → orchestrator bridge.
//!
//! Long-polls for submission orders, validates, triggers the job flow, and
//! acks only after the trigger was durably accepted. A failed trigger leaves
//! the message unacked so the visibility timeout redelivers it, bounded by
//! the queue's max-receive-count and DLQ. Malformed messages are dropped
//! outright: retry cannot fix bad input.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{info, warn};

use listpilot_core::config::{FlowConfig, QueueConfig};
use listpilot_core::job::{HistoryEvent, Job, QueueHistoryEvent};
use listpilot_queue::consumer::{QueueConsumer, QueueMessage};
use listpilot_queue::parser::{parse_order, SubmissionOrder};
use listpilot_store::traits::{HistoryStore, JobStore, Store};

use crate::error::FlowError;
use crate::orchestrator::Orchestrator;

// ── Circuit breaker ───────────────────────────────────────────

/// Trips after K consecutive trigger failures, pausing polling for a
/// cooldown window instead of hammering a down dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn is_open(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Close the breaker after a cooldown, giving the dependency a fresh
    /// failure budget.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

// ── Subscriber ────────────────────────────────────────────────

pub struct Subscriber {
    queue: Arc<dyn QueueConsumer>,
    store: Arc<dyn Store>,
    orchestrator: Orchestrator,
    max_batch: u32,
    poll_interval: Duration,
    breaker_threshold: u32,
    breaker_cooldown: Duration,
    worker_id: String,
}

impl Subscriber {
    pub fn new(
        queue: Arc<dyn QueueConsumer>,
        store: Arc<dyn Store>,
        orchestrator: Orchestrator,
        queue_config: &QueueConfig,
        flow_config: &FlowConfig,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            store,
            orchestrator,
            max_batch: queue_config.max_batch_size,
            poll_interval: Duration::from_millis(queue_config.poll_interval_ms),
            breaker_threshold: flow_config.breaker_threshold,
            breaker_cooldown: Duration::from_secs(flow_config.breaker_cooldown_secs),
            worker_id,
        }
    }

    /// Poll loop until shutdown.
    pub async fn run(self, shutdown: Arc<Notify>) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Subscriber started"
        );
        let mut breaker = CircuitBreaker::new(self.breaker_threshold, self.breaker_cooldown);

        loop {
            if breaker.is_open() {
                warn!(
                    cooldown_secs = breaker.cooldown().as_secs(),
                    "Circuit breaker open — pausing polling"
                );
                tokio::select! {
                    _ = tokio::time::sleep(breaker.cooldown()) => breaker.reset(),
                    _ = shutdown.notified() => break,
                }
                continue;
            }

            self.poll_once(&mut breaker).await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.notified() => break,
            }
        }

        info!("Subscriber stopped");
    }

    /// One poll cycle. Returns how many orders were triggered and acked.
    pub async fn poll_once(&self, breaker: &mut CircuitBreaker) -> usize {
        let messages = match self.queue.poll_batch(self.max_batch).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Queue poll failed");
                return 0;
            }
        };

        let mut handled = 0;
        for message in messages {
            let order = match parse_order(&message) {
                Ok(order) => order,
                Err(e) => {
                    // Validation failure: drop, do not retry. Deleting the
                    // message is the drop — redelivery would only burn the
                    // receive budget to reach the same conclusion.
                    warn!(message_id = %message.id, error = %e, "Dropping malformed submission order");
                    if let Err(e) = self.queue.ack(&message.receipt_handle).await {
                        warn!(message_id = %message.id, error = %e, "Failed to delete malformed message");
                    }
                    continue;
                }
            };

            match self.process_order(&message, &order).await {
                Ok(()) => {
                    breaker.record_success();
                    handled += 1;
                }
                Err(e) => {
                    breaker.record_failure();
                    warn!(
                        job_id = %order.job_id,
                        attempt = message.attempt_count,
                        error = %e,
                        "Trigger failed — leaving message for redelivery"
                    );
                }
            }
        }
        handled
    }

    async fn process_order(
        &self,
        message: &QueueMessage,
        order: &SubmissionOrder,
    ) -> Result<(), FlowError> {
        // Producers other than our gateway can enqueue orders; make sure
        // the job row exists (idempotent insert).
        let job = Job::new(
            order.job_id,
            order.customer_id.clone(),
            order.package_size as i32,
        );
        self.store.create_job(&job).await?;

        self.store
            .append(
                &QueueHistoryEvent::new(
                    order.job_id,
                    HistoryEvent::QueueClaimed,
                    serde_json::json!({
                        "message_id": message.id,
                        "attempt": message.attempt_count,
                        "priority": order.priority,
                        "source": order.source,
                    }),
                )
                .with_worker(self.worker_id.clone()),
            )
            .await?;

        // Fire-and-forget: returns as soon as the claim is durable, while
        // the fan-out proceeds in the background.
        let handle = self.orchestrator.start_job(order.job_id).await?;

        self.store
            .append(
                &QueueHistoryEvent::new(
                    order.job_id,
                    HistoryEvent::FlowTriggered,
                    serde_json::json!({ "newly_started": handle.newly_started }),
                )
                .with_worker(self.worker_id.clone()),
            )
            .await?;

        // Ack only now: if anything above failed, the message stays in
        // flight and redelivers after its visibility timeout.
        self.queue.ack(&message.receipt_handle).await?;
        Ok(())
    }
}
