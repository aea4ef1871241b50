//! In-memory credential store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::api_key::{ApiKey, ApiKeyId, CredentialStore};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Records {
    keys: HashMap<String, ApiKey>,
    /// key_hash -> key_id
    hash_index: HashMap<String, String>,
}

/// In-memory implementation of CredentialStore.
///
/// One lock guards both the records and the hash index, so every
/// operation sees and leaves them consistent.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<Records>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.keys.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .hash_index
            .get(key_hash)
            .and_then(|id| records.keys.get(id))
            .cloned())
    }

    async fn get(&self, key_id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let records = self.records.read().await;
        Ok(records.keys.get(key_id.as_str()).cloned())
    }

    async fn put(&self, api_key: &ApiKey) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let id = api_key.key_id().as_str();

        if records.keys.contains_key(id) {
            return Err(DomainError::conflict(format!(
                "API key with ID '{}' already exists",
                id
            )));
        }

        if records.hash_index.contains_key(api_key.key_hash()) {
            return Err(DomainError::conflict("API key hash already registered"));
        }

        records
            .hash_index
            .insert(api_key.key_hash().to_string(), id.to_string());
        records.keys.insert(id.to_string(), api_key.clone());

        Ok(())
    }

    async fn mark_revoked(&self, key_id: &ApiKeyId, at: DateTime<Utc>) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;

        match records.keys.get_mut(key_id.as_str()) {
            Some(key) => {
                key.revoke(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_usage(&self, key_id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut records = self.records.write().await;

        match records.keys.get_mut(key_id.as_str()) {
            Some(key) => {
                key.record_usage(at);
                Ok(())
            }
            None => Err(DomainError::not_found(format!(
                "API key '{}' not found",
                key_id
            ))),
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        let records = self.records.read().await;

        let mut keys: Vec<ApiKey> = records
            .keys
            .values()
            .filter(|k| k.owner_id() == owner_id)
            .cloned()
            .collect();
        keys.sort_by_key(|k| k.issued_at());

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::Scope;
    use chrono::Duration;

    fn key(id: &str, hash: &str, owner: &str) -> ApiKey {
        let now = Utc::now();
        ApiKey::new(
            ApiKeyId::new(id).unwrap(),
            hash,
            owner,
            Scope::ReadOnly,
            now,
            now + Duration::hours(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_and_lookup() {
        let store = InMemoryCredentialStore::new();
        let k = key("key-1", "hash-1", "owner-1");

        store.put(&k).await.unwrap();

        assert_eq!(store.get(k.key_id()).await.unwrap(), Some(k.clone()));
        assert_eq!(store.get_by_hash("hash-1").await.unwrap(), Some(k));
        assert_eq!(store.get_by_hash("hash-2").await.unwrap(), None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_conflicts() {
        let store = InMemoryCredentialStore::new();
        store.put(&key("key-1", "hash-1", "o")).await.unwrap();

        let same_id = store.put(&key("key-1", "hash-2", "o")).await;
        assert!(matches!(same_id, Err(DomainError::Conflict { .. })));

        let same_hash = store.put(&key("key-2", "hash-1", "o")).await;
        assert!(matches!(same_hash, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_mark_revoked() {
        let store = InMemoryCredentialStore::new();
        let k = key("key-1", "hash-1", "o");
        store.put(&k).await.unwrap();

        let at = Utc::now();
        assert!(store.mark_revoked(k.key_id(), at).await.unwrap());
        assert!(store.mark_revoked(k.key_id(), at + Duration::seconds(5)).await.unwrap());

        let stored = store.get_by_hash("hash-1").await.unwrap().unwrap();
        assert!(stored.is_revoked());
        assert_eq!(stored.revoked_at(), Some(at));

        let unknown = ApiKeyId::new("key-404").unwrap();
        assert!(!store.mark_revoked(&unknown, at).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_usage() {
        let store = InMemoryCredentialStore::new();
        let k = key("key-1", "hash-1", "o");
        store.put(&k).await.unwrap();

        let at = Utc::now();
        store.record_usage(k.key_id(), at).await.unwrap();
        assert_eq!(store.get(k.key_id()).await.unwrap().unwrap().last_used_at(), Some(at));
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let store = InMemoryCredentialStore::new();
        store.put(&key("key-1", "h1", "alice")).await.unwrap();
        store.put(&key("key-2", "h2", "bob")).await.unwrap();
        store.put(&key("key-3", "h3", "alice")).await.unwrap();

        let alice = store.list_by_owner("alice").await.unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|k| k.owner_id() == "alice"));
        assert!(store.list_by_owner("carol").await.unwrap().is_empty());
    }
}
