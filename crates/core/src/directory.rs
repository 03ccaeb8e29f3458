//! Target directory descriptors and the ordered submission catalog.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Url,
    Phone,
    Textarea,
    Select,
}

/// One known form field on a directory's submission page.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormField {
    /// Semantic field name (e.g. "business_name", "email").
    pub name: String,
    /// CSS selector for the input element.
    pub selector: String,
    pub kind: FieldKind,
}

impl FormField {
    pub fn new(name: &str, selector: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            kind,
        }
    }
}

/// Descriptor for one target directory: where the form lives and what we
/// know about its shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Directory {
    /// Stable slug used in idempotency keys. Renaming a directory's display
    /// name must not change keys, so this is separate from `name`.
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
    pub submit_selector: String,
    /// Whether the submission form is known to present a CAPTCHA.
    #[serde(default)]
    pub captcha: bool,
    /// Politeness delay before touching this site, if it rate-limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_ms: Option<u64>,
}

/// Ordered list of target directories. A package of size N submits to the
/// first N entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryCatalog {
    pub directories: Vec<Directory>,
}

impl DirectoryCatalog {
    /// Built-in catalog of general business directories, best first.
    pub fn builtin() -> Self {
        fn standard_fields() -> Vec<FormField> {
            vec![
                FormField::new("business_name", "input[name='business_name']", FieldKind::Text),
                FormField::new("website", "input[name='website']", FieldKind::Url),
                FormField::new("email", "input[name='email']", FieldKind::Email),
                FormField::new("phone", "input[name='phone']", FieldKind::Phone),
                FormField::new("description", "textarea[name='description']", FieldKind::Textarea),
                FormField::new("category", "select[name='category']", FieldKind::Select),
            ]
        }

        let mut directories = Vec::new();
        let entries: &[(&str, &str, &str, bool, Option<u64>)] = &[
            ("hotfrog", "Hotfrog", "https://www.hotfrog.com/add-business", false, None),
            ("brownbook", "Brownbook", "https://www.brownbook.net/add-business", false, None),
            ("cylex", "Cylex", "https://www.cylex.us.com/add-company", false, None),
            ("tupalo", "Tupalo", "https://tupalo.com/en/business/new", false, None),
            ("find-us-here", "Find Us Here", "https://www.find-us-here.com/add-business", false, None),
            ("callupcontact", "Call Up Contact", "https://www.callupcontact.com/add", false, None),
            ("fyple", "Fyple", "https://www.fyple.com/add-company", true, None),
            ("yellowbot", "YellowBot", "https://www.yellowbot.com/business/add", false, Some(1500)),
            ("opendi", "Opendi", "https://www.opendi.us/add-company", false, None),
            ("cybo", "Cybo", "https://www.cybo.com/add-business", false, Some(2000)),
        ];
        for (id, name, url, captcha, rate_limit_ms) in entries {
            directories.push(Directory {
                id: id.to_string(),
                name: name.to_string(),
                url: url.to_string(),
                fields: standard_fields(),
                submit_selector: "button[type='submit']".to_string(),
                captcha: *captcha,
                rate_limit_ms: *rate_limit_ms,
            });
        }
        Self { directories }
    }

    /// Load a catalog override from a JSON file, falling back to the
    /// built-in list on any error.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<DirectoryCatalog>(&raw) {
                Ok(catalog) if !catalog.directories.is_empty() => catalog,
                Ok(_) => {
                    warn!(path = %path.display(), "Directory catalog file is empty — using built-in catalog");
                    Self::builtin()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse directory catalog — using built-in catalog");
                    Self::builtin()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read directory catalog — using built-in catalog");
                Self::builtin()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// The ordered directory list for a package, bounded by package_size.
    /// Logs when the catalog is shorter than the purchased package.
    pub fn take(&self, package_size: usize) -> Vec<Directory> {
        if package_size > self.directories.len() {
            warn!(
                package_size,
                catalog_size = self.directories.len(),
                "Package is larger than the directory catalog — remaining slots will be skipped"
            );
        }
        self.directories.iter().take(package_size).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_ordered_and_nonempty() {
        let catalog = DirectoryCatalog::builtin();
        assert!(catalog.len() >= 5);
        assert_eq!(catalog.directories[0].id, "hotfrog");
        for dir in &catalog.directories {
            assert!(!dir.fields.is_empty());
            assert!(!dir.submit_selector.is_empty());
        }
    }

    #[test]
    fn take_bounds_by_package_size() {
        let catalog = DirectoryCatalog::builtin();
        assert_eq!(catalog.take(3).len(), 3);
        assert_eq!(catalog.take(0).len(), 0);
        // Oversized packages get the whole catalog, not a panic.
        assert_eq!(catalog.take(catalog.len() + 10).len(), catalog.len());
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let catalog = DirectoryCatalog::builtin();
        let raw = serde_json::to_string(&catalog).unwrap();
        let back: DirectoryCatalog = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.len(), catalog.len());
        assert_eq!(back.directories[0].id, catalog.directories[0].id);
    }

    #[test]
    fn load_missing_file_falls_back_to_builtin() {
        let catalog = DirectoryCatalog::load_or_builtin(Some(Path::new("/nonexistent/catalog.json")));
        assert_eq!(catalog.len(), DirectoryCatalog::builtin().len());
    }
}
