//! Business profile snapshot — the payload submitted to each directory.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BusinessProfile {
    pub business_name: String,
    pub website: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
}

impl BusinessProfile {
    /// The exact JSON snapshot persisted with each submission attempt.
    /// Idempotency keys are derived from this value, so it must contain
    /// everything that makes two submissions "the same submission".
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BusinessProfile {
        BusinessProfile {
            business_name: "Acme Coffee".into(),
            website: "https://acme.coffee".into(),
            email: "hello@acme.coffee".into(),
            phone: Some("+1-555-0100".into()),
            city: Some("Portland".into()),
            description: Some("Small-batch roaster".into()),
            category: Some("Food & Drink".into()),
            ..Default::default()
        }
    }

    #[test]
    fn payload_round_trips() {
        let profile = sample();
        let payload = profile.to_payload();
        let back: BusinessProfile = serde_json::from_value(payload).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn payload_omits_unset_fields() {
        let payload = sample().to_payload();
        let obj = payload.as_object().unwrap();
        assert!(obj.contains_key("business_name"));
        assert!(!obj.contains_key("facebook"));
        assert!(!obj.contains_key("address"));
    }
}
