//! API key domain
//!
//! Domain types and the store trait for API key issuance, scopes and
//! guild/channel restrictions.

mod entity;
mod repository;
mod validation;

pub use entity::{ApiKey, ApiKeyId, Restriction, RestrictionSet, Scope};
pub use repository::CredentialStore;
#[cfg(test)]
pub use repository::MockCredentialStore;
pub use validation::{validate_api_key_id, validate_owner_id, ApiKeyValidationError};
