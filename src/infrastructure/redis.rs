//! Shared Redis connection setup

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use crate::config::StoreConfig;
use crate::domain::DomainError;

/// Open a managed connection, bounded by the configured connect timeout
pub async fn connect(config: &StoreConfig) -> Result<ConnectionManager, DomainError> {
    let client = Client::open(config.redis_url.as_str())
        .map_err(|e| DomainError::configuration(format!("Invalid Redis URL: {}", e)))?;

    let connection = tokio::time::timeout(config.connect_timeout(), ConnectionManager::new(client))
        .await
        .map_err(|_| {
            DomainError::storage(format!(
                "Timed out connecting to Redis after {}ms",
                config.connect_timeout_ms
            ))
        })?
        .map_err(|e| DomainError::storage(format!("Failed to connect to Redis: {}", e)))?;

    info!(prefix = %config.key_prefix, "Connected to Redis");
    Ok(connection)
}

/// Key namespace shared by the Redis-backed stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisNamespace {
    prefix: String,
}

impl RedisNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `{prefix}:{kind}:{id}`
    pub fn key(&self, kind: &str, id: &str) -> String {
        format!("{}:{}:{}", self.prefix, kind, id)
    }
}
