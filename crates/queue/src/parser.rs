//! Parse and validate queue message bodies into [`SubmissionOrder`]s.
//!
//! Required fields: job_id, customer_id, package_size. A message missing any
//! of them is rejected with [`QueueError::Validation`] and must be dropped by
//! the caller — redelivery cannot fix malformed input.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::consumer::QueueMessage;
use crate::error::QueueError;

/// A validated "submit this business to N directories" order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOrder {
    pub job_id: Uuid,
    pub customer_id: String,
    pub package_size: u32,
    /// Normalized priority: higher runs sooner. Accepts ints or the
    /// well-known strings "high" / "normal" / "low".
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
}

const PRIORITY_DEFAULT: i32 = 5;

fn parse_priority(value: Option<&Value>) -> i32 {
    match value {
        Some(Value::Number(n)) => n.as_i64().map(|v| v as i32).unwrap_or(PRIORITY_DEFAULT),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "high" | "urgent" => 10,
            "normal" | "default" => PRIORITY_DEFAULT,
            "low" => 1,
            other => other.parse().unwrap_or(PRIORITY_DEFAULT),
        },
        _ => PRIORITY_DEFAULT,
    }
}

fn required_str<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a str, QueueError> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QueueError::Validation(format!("missing required field '{key}'")))
}

/// Parse a single queue message body into a [`SubmissionOrder`].
pub fn parse_order(msg: &QueueMessage) -> Result<SubmissionOrder, QueueError> {
    let json: Value = serde_json::from_str(&msg.body)
        .map_err(|e| QueueError::Parse(format!("invalid JSON in message {}: {}", msg.id, e)))?;

    let obj = json
        .as_object()
        .ok_or_else(|| QueueError::Parse(format!("message {} body is not a JSON object", msg.id)))?;

    let job_id = required_str(obj, "job_id")?;
    let job_id = Uuid::parse_str(job_id)
        .map_err(|_| QueueError::Validation(format!("job_id '{job_id}' is not a UUID")))?;

    let customer_id = required_str(obj, "customer_id")?.to_string();

    let package_size = obj
        .get("package_size")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| QueueError::Validation("missing required field 'package_size'".into()))?;
    if package_size == 0 {
        return Err(QueueError::Validation("package_size must be >= 1".into()));
    }

    // Optional fields: fall back to the queue's delivery timestamp.
    let created_at = obj
        .get("created_at")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .unwrap_or(msg.timestamp);

    let source = obj
        .get("source")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(SubmissionOrder {
        job_id,
        customer_id,
        package_size: package_size as u32,
        priority: parse_priority(obj.get("priority")),
        created_at,
        source,
    })
}

/// Parse a batch of messages, separating successes from failures.
///
/// Returns `(orders, errors)`. Good messages are never blocked by bad ones.
pub fn parse_batch(messages: &[QueueMessage]) -> (Vec<(QueueMessage, SubmissionOrder)>, Vec<(String, QueueError)>) {
    let mut orders = Vec::with_capacity(messages.len());
    let mut errors = Vec::new();

    for msg in messages {
        match parse_order(msg) {
            Ok(order) => orders.push((msg.clone(), order)),
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "Failed to parse queue message");
                errors.push((msg.id.clone(), e));
            }
        }
    }

    (orders, errors)
}
