use std::fmt;
use std::time::Duration as StdDuration;

use chrono::Duration;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::Deserialize;

use crate::domain::DomainError;

/// Minimum length of an HMAC signing secret
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest API key lifetime accepted at startup (ten years)
pub const MAX_KEY_TTL_HOURS: u64 = 87_600;

/// Longest rate limit window accepted at startup (one day)
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// Flat environment names accepted for compatibility with existing `.env`
/// files, mapped onto their config keys. The first name that is set wins.
const FLAT_ENV_OVERRIDES: &[(&[&str], &str)] = &[
    (&["SECRET_KEY", "JWT_SECRET"], "auth.secret_key"),
    (&["ALGORITHM"], "auth.algorithm"),
    (&["API_KEY_EXPIRE_HOURS"], "auth.key_default_ttl_hours"),
    (&["REDIS_URL"], "store.redis_url"),
    (&["RATE_LIMIT_REQUESTS"], "rate_limit.requests"),
    (&["RATE_LIMIT_WINDOW"], "rate_limit.window_secs"),
    (&["LOG_LEVEL"], "logging.level"),
    (&["LOG_FORMAT"], "logging.format"),
];

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub algorithm: SigningAlgorithm,
    pub token_ttl_secs: u64,
    pub key_default_ttl_hours: u64,
    pub key_max_ttl_hours: u64,
    pub issuer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    #[serde(rename = "HS256", alias = "hs256")]
    Hs256,
    #[serde(rename = "HS384", alias = "hs384")]
    Hs384,
    #[serde(rename = "HS512", alias = "hs512")]
    Hs512,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: String,
    pub key_prefix: String,
    /// Upper bound for a single store call
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            algorithm: SigningAlgorithm::default(),
            token_ttl_secs: 900,
            key_default_ttl_hours: 24,
            key_max_ttl_hours: 2160,
            issuer: "discord-mcp-server".to_string(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"[redacted]")
            .field("algorithm", &self.algorithm)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("key_default_ttl_hours", &self.key_default_ttl_hours)
            .field("key_max_ttl_hours", &self.key_max_ttl_hours)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        seconds(self.token_ttl_secs)
    }

    pub fn key_default_ttl(&self) -> Duration {
        hours(self.key_default_ttl_hours)
    }

    pub fn key_max_ttl(&self) -> Duration {
        hours(self.key_max_ttl_hours)
    }
}

// Out-of-range values saturate; `validate` keeps loaded configs well below.
fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn hours(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_hours)
        .unwrap_or(Duration::MAX)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        seconds(self.window_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "discord-mcp".to_string(),
            timeout_ms: 500,
            connect_timeout_ms: 5000,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from `config/default`, `config/local`, `APP__*` variables and
    /// the flat `.env` names, in increasing precedence
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let builder = apply_flat_env(builder, |name| std::env::var(name).ok())?;
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Startup checks. Any failure here is fatal.
    pub fn validate(&self) -> Result<(), DomainError> {
        let auth = &self.auth;

        if auth.secret_key.trim().is_empty() {
            return Err(DomainError::configuration(
                "auth.secret_key is required (set SECRET_KEY or APP__AUTH__SECRET_KEY)",
            ));
        }

        if auth.secret_key.len() < MIN_SECRET_BYTES {
            return Err(DomainError::configuration(format!(
                "auth.secret_key must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }

        if auth.token_ttl_secs == 0 {
            return Err(DomainError::configuration("auth.token_ttl_secs must be positive"));
        }

        if auth.key_default_ttl_hours == 0 || auth.key_max_ttl_hours == 0 {
            return Err(DomainError::configuration("API key TTLs must be positive"));
        }

        if auth.key_max_ttl_hours > MAX_KEY_TTL_HOURS {
            return Err(DomainError::configuration(format!(
                "auth.key_max_ttl_hours must not exceed {}",
                MAX_KEY_TTL_HOURS
            )));
        }

        if auth.token_ttl_secs > auth.key_max_ttl_hours * 3600 {
            return Err(DomainError::configuration(
                "auth.token_ttl_secs exceeds auth.key_max_ttl_hours",
            ));
        }

        if auth.key_default_ttl_hours > auth.key_max_ttl_hours {
            return Err(DomainError::configuration(
                "auth.key_default_ttl_hours exceeds auth.key_max_ttl_hours",
            ));
        }

        if auth.issuer.trim().is_empty() {
            return Err(DomainError::configuration("auth.issuer must not be empty"));
        }

        if self.rate_limit.window_secs == 0 || self.rate_limit.window_secs > MAX_WINDOW_SECS {
            return Err(DomainError::configuration(format!(
                "rate_limit.window_secs must be between 1 and {}",
                MAX_WINDOW_SECS
            )));
        }

        if self.store.timeout_ms == 0 || self.store.connect_timeout_ms == 0 {
            return Err(DomainError::configuration("store timeouts must be positive"));
        }

        if self.store.key_prefix.trim().is_empty() {
            return Err(DomainError::configuration("store.key_prefix must not be empty"));
        }

        Ok(())
    }
}

fn apply_flat_env<F>(
    mut builder: ConfigBuilder<DefaultState>,
    lookup: F,
) -> Result<ConfigBuilder<DefaultState>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (names, key) in FLAT_ENV_OVERRIDES {
        let value = names.iter().find_map(|name| lookup(name));
        builder = builder.set_override_option(*key, value)?;
    }
    Ok(builder)
}
