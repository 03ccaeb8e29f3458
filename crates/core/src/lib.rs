pub mod config;
pub mod directory;
pub mod failure;
pub mod idempotency;
pub mod job;
pub mod profile;

pub use config::Config;
pub use directory::{Directory, DirectoryCatalog, FieldKind, FormField};
pub use failure::FailureKind;
pub use idempotency::{canonical_json, idempotency_key};
pub use job::*;
pub use profile::BusinessProfile;
