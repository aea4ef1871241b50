//! Credential store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::{ApiKey, ApiKeyId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Persistence for API key records.
///
/// Records are never deleted. Each read returns a single consistent
/// snapshot of a record, so a revocation is visible to every read that
/// starts after `mark_revoked` returns.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Look up a key by the hash of its secret
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DomainError>;

    /// Look up a key by its identifier
    async fn get(&self, key_id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Persist a newly issued key. Fails with `Conflict` if the id or
    /// hash is already taken.
    async fn put(&self, api_key: &ApiKey) -> Result<(), DomainError>;

    /// Flag a key as revoked. Returns `false` if the key is unknown;
    /// revoking an already revoked key succeeds and keeps the original
    /// revocation time.
    async fn mark_revoked(&self, key_id: &ApiKeyId, at: DateTime<Utc>)
        -> Result<bool, DomainError>;

    /// Record the last time a key was exchanged
    async fn record_usage(&self, key_id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError>;

    /// List every key issued to an owner
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError>;
}
