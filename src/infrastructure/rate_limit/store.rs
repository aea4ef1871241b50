//! Rate limit window stores

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tokio::sync::Mutex;

use crate::domain::{DomainError, RateLimitStore, RateLimitWindow, WindowSnapshot};
use crate::infrastructure::redis::RedisNamespace;

/// In-memory window store. The mutex makes each consume a single
/// read-modify-write.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn window(&self, key_id: &str) -> Option<RateLimitWindow> {
        self.windows.lock().await.get(key_id).copied()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn atomic_incr_with_window(
        &self,
        key_id: &str,
        now: DateTime<Utc>,
        window: Duration,
        limit: u32,
    ) -> Result<WindowSnapshot, DomainError> {
        let mut windows = self.windows.lock().await;
        let entry = windows
            .entry(key_id.to_string())
            .or_insert_with(|| RateLimitWindow::starting_at(now));

        Ok(entry.consume(now, window, limit))
    }

    async fn reset(&self, key_id: &str) -> Result<(), DomainError> {
        self.windows.lock().await.remove(key_id);
        Ok(())
    }
}

// KEYS[1] window hash; ARGV: now_ms, window_ms, limit.
// Returns {window_start_ms, count, allowed}.
const CONSUME_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local start = tonumber(redis.call('HGET', KEYS[1], 'start'))
local count = tonumber(redis.call('HGET', KEYS[1], 'count'))
if start == nil or count == nil or now - start >= window then
  start = now
  count = 0
end
local allowed = 0
if count < limit then
  count = count + 1
  allowed = 1
end
redis.call('HSET', KEYS[1], 'start', start, 'count', count)
redis.call('PEXPIRE', KEYS[1], math.max(start + window - now, 1))
return {start, count, allowed}
"#;

/// Redis window store. Each consume runs as one Lua script, so the
/// check and the increment cannot interleave with another request.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    connection: ConnectionManager,
    namespace: RedisNamespace,
    consume_script: Script,
}

impl fmt::Debug for RedisRateLimitStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisRateLimitStore")
            .field("namespace", &self.namespace)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisRateLimitStore {
    pub fn new(connection: ConnectionManager, namespace: RedisNamespace) -> Self {
        Self {
            connection,
            namespace,
            consume_script: Script::new(CONSUME_SCRIPT),
        }
    }

    fn window_key(&self, key_id: &str) -> String {
        self.namespace.key("ratelimit", key_id)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn atomic_incr_with_window(
        &self,
        key_id: &str,
        now: DateTime<Utc>,
        window: Duration,
        limit: u32,
    ) -> Result<WindowSnapshot, DomainError> {
        let mut conn = self.connection.clone();
        let (start_ms, count, allowed): (i64, i64, i64) = self
            .consume_script
            .key(self.window_key(key_id))
            .arg(now.timestamp_millis())
            .arg(window.num_milliseconds())
            .arg(limit)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| DomainError::storage(format!("Redis rate limit update failed: {}", e)))?;

        let window_start = DateTime::from_timestamp_millis(start_ms)
            .ok_or_else(|| DomainError::storage("Corrupt rate limit window start"))?;

        Ok(WindowSnapshot {
            window_start,
            count: u32::try_from(count)
                .map_err(|_| DomainError::storage("Corrupt rate limit count"))?,
            allowed: allowed == 1,
        })
    }

    async fn reset(&self, key_id: &str) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn
            .del(self.window_key(key_id))
            .await
            .map_err(|e| DomainError::storage(format!("Redis rate limit reset failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_window_lifecycle() {
        let store = InMemoryRateLimitStore::new();
        let window = Duration::seconds(60);

        assert!(store.window("key-1").await.is_none());

        let first = store.atomic_incr_with_window("key-1", t0(), window, 2).await.unwrap();
        assert!(first.allowed);
        assert_eq!(first.count, 1);
        assert_eq!(first.window_start, t0());

        store.atomic_incr_with_window("key-1", t0(), window, 2).await.unwrap();
        let third = store.atomic_incr_with_window("key-1", t0(), window, 2).await.unwrap();
        assert!(!third.allowed);
        assert_eq!(store.window("key-1").await.unwrap().count, 2);

        store.reset("key-1").await.unwrap();
        assert!(store.window("key-1").await.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_keys_are_independent() {
        let store = InMemoryRateLimitStore::new();
        let window = Duration::seconds(60);

        store.atomic_incr_with_window("a", t0(), window, 1).await.unwrap();
        let other = store.atomic_incr_with_window("b", t0(), window, 1).await.unwrap();
        assert!(other.allowed);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL or redis://localhost:6379"]
    async fn test_redis_window() {
        let config = StoreConfig {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ..StoreConfig::default()
        };
        let connection = crate::infrastructure::redis::connect(&config).await.unwrap();
        let store = RedisRateLimitStore::new(
            connection,
            RedisNamespace::new(format!("test-{}", Uuid::new_v4().simple())),
        );
        let now = Utc::now();
        let window = Duration::seconds(60);

        for expected in 1..=3 {
            let snap = store.atomic_incr_with_window("key-1", now, window, 3).await.unwrap();
            assert!(snap.allowed);
            assert_eq!(snap.count, expected);
        }
        let denied = store.atomic_incr_with_window("key-1", now, window, 3).await.unwrap();
        assert!(!denied.allowed);

        let fresh = store
            .atomic_incr_with_window("key-1", now + window, window, 3)
            .await
            .unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.count, 1);

        store.reset("key-1").await.unwrap();
    }
}
