//! Content-derived idempotency keys.
//!
//! The key for a submission is a hash over (job_id, directory_id, canonical
//! payload), so the same logical submission always produces the same key no
//! matter which worker computes it or how the payload's JSON keys were
//! ordered. Duplicate executions collapse to one effect via upserts on the
//! result store keyed by this value.

use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Serialize a JSON value with recursively sorted object keys and compact
/// separators. Payloads differing only in key order canonicalize identically.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&normalize(value)).unwrap_or_default()
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k.clone(), normalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

/// Deterministic key for one (job, directory, payload) submission.
pub fn idempotency_key(job_id: Uuid, directory_id: &str, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(directory_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_json(payload).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let a = json!({"b": 1, "a": {"z": true, "y": [1, 2]}});
        let b = json!({"a": {"y": [1, 2], "z": true}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"y":[1,2],"z":true},"b":1}"#);
    }

    #[test]
    fn key_is_deterministic_across_key_order() {
        let job_id = Uuid::new_v4();
        let a = json!({"name": "Acme", "email": "hi@acme.test"});
        let b = json!({"email": "hi@acme.test", "name": "Acme"});
        assert_eq!(
            idempotency_key(job_id, "yelp", &a),
            idempotency_key(job_id, "yelp", &b)
        );
    }

    #[test]
    fn key_varies_with_inputs() {
        let job_id = Uuid::new_v4();
        let payload = json!({"name": "Acme"});
        let base = idempotency_key(job_id, "yelp", &payload);

        assert_ne!(base, idempotency_key(Uuid::new_v4(), "yelp", &payload));
        assert_ne!(base, idempotency_key(job_id, "manta", &payload));
        assert_ne!(base, idempotency_key(job_id, "yelp", &json!({"name": "Other"})));
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = idempotency_key(Uuid::new_v4(), "yelp", &json!({}));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
