//! Best-effort field mapping without a learned model.
//!
//! When no learned mapping exists for a directory, the pipeline still
//! attempts the submission: each known form field's semantic name is probed
//! against well-known key tables and matched to the corresponding profile
//! value. Fields we cannot map are simply left unfilled — this mapper never
//! errors.

use listpilot_core::directory::{Directory, FieldKind};
use listpilot_core::profile::BusinessProfile;

use crate::types::{FillAction, FillPlan, Obstacle};

/// Well-known field names for the business name (tried in order).
const NAME_KEYS: &[&str] = &["business_name", "businessname", "company", "company_name", "name", "title"];
const WEBSITE_KEYS: &[&str] = &["website", "url", "site", "homepage", "web"];
const EMAIL_KEYS: &[&str] = &["email", "e-mail", "contact_email", "mail"];
const PHONE_KEYS: &[&str] = &["phone", "telephone", "tel", "phone_number", "mobile"];
const ADDRESS_KEYS: &[&str] = &["address", "street", "street_address", "address1"];
const CITY_KEYS: &[&str] = &["city", "town", "locality"];
const REGION_KEYS: &[&str] = &["region", "state", "province", "county"];
const POSTAL_KEYS: &[&str] = &["postal_code", "postcode", "zip", "zip_code"];
const COUNTRY_KEYS: &[&str] = &["country"];
const DESCRIPTION_KEYS: &[&str] = &["description", "about", "bio", "summary", "details"];
const CATEGORY_KEYS: &[&str] = &["category", "industry", "business_type", "sector"];

fn matches_any(name: &str, keys: &[&str]) -> bool {
    let normalized = name.to_ascii_lowercase().replace(['-', ' '], "_");
    keys.iter().any(|k| normalized == *k)
}

/// Heuristic mapper: profile values keyed by probed field names.
pub struct HeuristicMapper;

impl HeuristicMapper {
    /// Build a best-effort plan for one directory form. Unmappable fields
    /// are skipped, never fatal.
    pub fn plan(directory: &Directory, profile: &BusinessProfile) -> FillPlan {
        let mut actions = Vec::new();

        for field in &directory.fields {
            let value = Self::value_for(&field.name, field.kind, profile);
            if let Some(value) = value {
                if !value.is_empty() {
                    actions.push(FillAction {
                        selector: field.selector.clone(),
                        value,
                    });
                }
            }
        }

        let mut obstacles = Vec::new();
        if directory.captcha {
            obstacles.push(Obstacle::Captcha);
        }

        FillPlan {
            actions,
            submit_selector: directory.submit_selector.clone(),
            obstacles,
        }
    }

    fn value_for(name: &str, kind: FieldKind, profile: &BusinessProfile) -> Option<String> {
        // Field kind disambiguates generic names like "name" on email/url inputs.
        match kind {
            FieldKind::Email => return Some(profile.email.clone()),
            FieldKind::Url => return Some(profile.website.clone()),
            FieldKind::Phone => return profile.phone.clone(),
            _ => {}
        }

        if matches_any(name, NAME_KEYS) {
            Some(profile.business_name.clone())
        } else if matches_any(name, WEBSITE_KEYS) {
            Some(profile.website.clone())
        } else if matches_any(name, EMAIL_KEYS) {
            Some(profile.email.clone())
        } else if matches_any(name, PHONE_KEYS) {
            profile.phone.clone()
        } else if matches_any(name, ADDRESS_KEYS) {
            profile.address.clone()
        } else if matches_any(name, CITY_KEYS) {
            profile.city.clone()
        } else if matches_any(name, REGION_KEYS) {
            profile.region.clone()
        } else if matches_any(name, POSTAL_KEYS) {
            profile.postal_code.clone()
        } else if matches_any(name, COUNTRY_KEYS) {
            profile.country.clone()
        } else if matches_any(name, DESCRIPTION_KEYS) {
            profile.description.clone()
        } else if matches_any(name, CATEGORY_KEYS) {
            profile.category.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listpilot_core::directory::{DirectoryCatalog, FormField};

    fn profile() -> BusinessProfile {
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
    fn maps_standard_catalog_fields() {
        let catalog = DirectoryCatalog::builtin();
        let plan = HeuristicMapper::plan(&catalog.directories[0], &profile());

        // name, website, email, phone, description, category all present.
        assert_eq!(plan.actions.len(), 6);
        assert!(plan
            .actions
            .iter()
            .any(|a| a.value == "Acme Coffee" && a.selector.contains("business_name")));
        assert_eq!(plan.submit_selector, "button[type='submit']");
    }

    #[test]
    fn unknown_fields_are_skipped_not_fatal() {
        let mut dir = DirectoryCatalog::builtin().directories[0].clone();
        dir.fields.push(FormField::new("vat_number", "#vat", FieldKind::Text));
        let plan = HeuristicMapper::plan(&dir, &profile());
        assert!(!plan.actions.iter().any(|a| a.selector == "#vat"));
    }

    #[test]
    fn missing_profile_values_produce_no_actions() {
        let dir = DirectoryCatalog::builtin().directories[0].clone();
        let sparse = BusinessProfile {
            business_name: "Acme".into(),
            website: "https://acme.test".into(),
            email: "a@acme.test".into(),
            ..Default::default()
        };
        let plan = HeuristicMapper::plan(&dir, &sparse);
        // phone/description/category unset: only name, website, email remain.
        assert_eq!(plan.actions.len(), 3);
    }

    #[test]
    fn captcha_directories_flag_the_obstacle() {
        let catalog = DirectoryCatalog::builtin();
        let captcha_dir = catalog
            .directories
            .iter()
            .find(|d| d.captcha)
            .expect("builtin catalog has a captcha directory");
        let plan = HeuristicMapper::plan(captcha_dir, &profile());
        assert!(plan.expects_captcha());
    }

    #[test]
    fn name_matching_normalizes_case_and_separators() {
        assert!(matches_any("Business-Name", NAME_KEYS));
        assert!(matches_any("ZIP code", POSTAL_KEYS));
        assert!(!matches_any("nickname", NAME_KEYS));
    }
}
