//! Redis-backed credential store
//!
//! Layout under the configured prefix:
//! - `{prefix}:key:{key_id}` hash with the JSON `record` plus the mutable
//!   `revoked_at` and `last_used_at` fields
//! - `{prefix}:hash:{key_hash}` -> key_id
//! - `{prefix}:owner:{owner_id}` set of key ids
//!
//! Every write is a single Lua script, so each record changes atomically.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::domain::api_key::{ApiKey, ApiKeyId, CredentialStore};
use crate::domain::DomainError;
use crate::infrastructure::redis::RedisNamespace;

const FIELD_RECORD: &str = "record";
const FIELD_REVOKED_AT: &str = "revoked_at";
const FIELD_LAST_USED_AT: &str = "last_used_at";

const PUT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then return 0 end
if redis.call('SETNX', KEYS[2], ARGV[2]) == 0 then return -1 end
redis.call('HSET', KEYS[1], 'record', ARGV[1])
redis.call('SADD', KEYS[3], ARGV[2])
return 1
"#;

const REVOKE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then return 0 end
redis.call('HSETNX', KEYS[1], 'revoked_at', ARGV[1])
return 1
"#;

const TOUCH_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then return 0 end
redis.call('HSET', KEYS[1], 'last_used_at', ARGV[1])
return 1
"#;

#[derive(Clone)]
pub struct RedisCredentialStore {
    connection: ConnectionManager,
    namespace: RedisNamespace,
    put_script: Script,
    revoke_script: Script,
    touch_script: Script,
}

impl fmt::Debug for RedisCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCredentialStore")
            .field("namespace", &self.namespace)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCredentialStore {
    pub fn new(connection: ConnectionManager, namespace: RedisNamespace) -> Self {
        Self {
            connection,
            namespace,
            put_script: Script::new(PUT_SCRIPT),
            revoke_script: Script::new(REVOKE_SCRIPT),
            touch_script: Script::new(TOUCH_SCRIPT),
        }
    }

    fn record_key(&self, key_id: &str) -> String {
        self.namespace.key("key", key_id)
    }

    fn hash_key(&self, key_hash: &str) -> String {
        self.namespace.key("hash", key_hash)
    }

    fn owner_key(&self, owner_id: &str) -> String {
        self.namespace.key("owner", owner_id)
    }

    async fn load(&self, key_id: &str) -> Result<Option<ApiKey>, DomainError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.record_key(key_id))
            .await
            .map_err(|e| redis_error("load key", e))?;

        decode_record(&fields)
    }
}

fn redis_error(operation: &str, e: redis::RedisError) -> DomainError {
    DomainError::storage(format!("Redis {} failed: {}", operation, e))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DomainError::storage(format!("Corrupt '{}' timestamp: {}", field, e)))
}

fn decode_record(fields: &HashMap<String, String>) -> Result<Option<ApiKey>, DomainError> {
    let Some(json) = fields.get(FIELD_RECORD) else {
        return Ok(None);
    };

    let mut key: ApiKey = serde_json::from_str(json)
        .map_err(|e| DomainError::storage(format!("Corrupt API key record: {}", e)))?;

    if let Some(at) = fields.get(FIELD_REVOKED_AT) {
        key.revoke(parse_timestamp(FIELD_REVOKED_AT, at)?);
    }

    if let Some(at) = fields.get(FIELD_LAST_USED_AT) {
        key.record_usage(parse_timestamp(FIELD_LAST_USED_AT, at)?);
    }

    Ok(Some(key))
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DomainError> {
        let mut conn = self.connection.clone();
        let key_id: Option<String> = conn
            .get(self.hash_key(key_hash))
            .await
            .map_err(|e| redis_error("hash lookup", e))?;

        match key_id {
            Some(id) => self.load(&id).await,
            None => Ok(None),
        }
    }

    async fn get(&self, key_id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        self.load(key_id.as_str()).await
    }

    async fn put(&self, api_key: &ApiKey) -> Result<(), DomainError> {
        let json = serde_json::to_string(api_key)
            .map_err(|e| DomainError::internal(format!("Failed to serialize API key: {}", e)))?;

        let mut conn = self.connection.clone();
        let outcome: i64 = self
            .put_script
            .key(self.record_key(api_key.key_id().as_str()))
            .key(self.hash_key(api_key.key_hash()))
            .key(self.owner_key(api_key.owner_id()))
            .arg(json)
            .arg(api_key.key_id().as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("put key", e))?;

        match outcome {
            1 => Ok(()),
            0 => Err(DomainError::conflict(format!(
                "API key with ID '{}' already exists",
                api_key.key_id()
            ))),
            _ => Err(DomainError::conflict("API key hash already registered")),
        }
    }

    async fn mark_revoked(&self, key_id: &ApiKeyId, at: DateTime<Utc>) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();
        let outcome: i64 = self
            .revoke_script
            .key(self.record_key(key_id.as_str()))
            .arg(at.to_rfc3339())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("revoke key", e))?;

        Ok(outcome == 1)
    }

    async fn record_usage(&self, key_id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        let outcome: i64 = self
            .touch_script
            .key(self.record_key(key_id.as_str()))
            .arg(at.to_rfc3339())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("record usage", e))?;

        if outcome == 1 {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("API key '{}' not found", key_id)))
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn
            .smembers(self.owner_key(owner_id))
            .await
            .map_err(|e| redis_error("list keys", e))?;

        let mut keys = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(key) = self.load(&id).await? {
                keys.push(key);
            }
        }
        keys.sort_by_key(|k| k.issued_at());

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::domain::api_key::Scope;
    use chrono::Duration;
    use uuid::Uuid;

    fn sample_key(now: DateTime<Utc>) -> ApiKey {
        ApiKey::new(
            ApiKeyId::new("key-1").unwrap(),
            "hash-1",
            "owner-1",
            Scope::ReadWrite,
            now,
            now + Duration::hours(1),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_missing_record() {
        assert_eq!(decode_record(&HashMap::new()).unwrap(), None);
    }

    #[test]
    fn test_decode_applies_mutable_fields() {
        let now = Utc::now();
        let key = sample_key(now);
        let revoked_at = now + Duration::minutes(1);
        let used_at = now + Duration::seconds(30);

        let fields = HashMap::from([
            (FIELD_RECORD.to_string(), serde_json::to_string(&key).unwrap()),
            (FIELD_REVOKED_AT.to_string(), revoked_at.to_rfc3339()),
            (FIELD_LAST_USED_AT.to_string(), used_at.to_rfc3339()),
        ]);

        let decoded = decode_record(&fields).unwrap().unwrap();
        assert!(decoded.is_revoked());
        assert_eq!(decoded.revoked_at(), Some(revoked_at));
        assert_eq!(decoded.last_used_at(), Some(used_at));
        assert_eq!(decoded.scope(), Scope::ReadWrite);
    }

    #[test]
    fn test_decode_rejects_corrupt_record() {
        let fields = HashMap::from([(FIELD_RECORD.to_string(), "{not json".to_string())]);
        assert!(matches!(
            decode_record(&fields),
            Err(DomainError::Storage { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL or redis://localhost:6379"]
    async fn test_redis_round_trip() {
        let config = StoreConfig {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ..StoreConfig::default()
        };
        let connection = crate::infrastructure::redis::connect(&config).await.unwrap();
        let prefix = format!("test-{}", Uuid::new_v4().simple());
        let store = RedisCredentialStore::new(connection, RedisNamespace::new(prefix));

        let now = Utc::now();
        let key = sample_key(now);
        store.put(&key).await.unwrap();
        assert!(matches!(store.put(&key).await, Err(DomainError::Conflict { .. })));

        let found = store.get_by_hash("hash-1").await.unwrap().unwrap();
        assert_eq!(found.key_id(), key.key_id());

        assert!(store.mark_revoked(key.key_id(), now).await.unwrap());
        assert!(store.get(key.key_id()).await.unwrap().unwrap().is_revoked());
        assert_eq!(store.list_by_owner("owner-1").await.unwrap().len(), 1);
    }
}
