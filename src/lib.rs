//! Discord MCP Auth
//!
//! Authentication and authorization core for a Discord MCP server:
//! - API key issuance, revocation and listing
//! - Exchange of API keys for short-lived signed session tokens
//! - Per-request scope and guild/channel authorization
//! - Fixed-window per-key rate limiting
//! - A gated dispatcher for the Discord tools

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use config::StoreBackend;
use domain::{
    ApiKey, ApiKeyId, AuditSink, AuthError, AuthorizationDecision, Clock, CredentialStore,
    DomainError, RateLimitStatus, RateLimitStore, RequestedAction, SessionToken, SystemClock,
};
use infrastructure::{
    api_key::{
        InMemoryCredentialStore, IssueKeyRequest, IssuedKey, KeyIssuer, KeyIssuerSettings,
        RedisCredentialStore,
    },
    audit::TracingAuditSink,
    auth::{Authorizer, SessionTokenService, TokenExchanger},
    rate_limit::{InMemoryRateLimitStore, RateLimiter, RateLimiterSettings, RedisRateLimitStore},
    redis::{self as redis_store, RedisNamespace},
    tools::{ToolDispatcher, ToolRegistry},
};

/// Explicit collaborators for [`AuthCore::with_stores`]
#[derive(Debug, Clone)]
pub struct AuthCoreDeps {
    pub credentials: Arc<dyn CredentialStore>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

/// Composition root wiring the four components over shared stores
#[derive(Debug, Clone)]
pub struct AuthCore {
    issuer: Arc<KeyIssuer>,
    exchanger: Arc<TokenExchanger>,
    authorizer: Arc<Authorizer>,
    rate_limiter: Arc<RateLimiter>,
}

impl AuthCore {
    /// Validate the config and connect the configured store backend
    pub async fn from_config(config: &AppConfig) -> Result<Self, DomainError> {
        config.validate()?;

        let (credentials, rate_limits): (Arc<dyn CredentialStore>, Arc<dyn RateLimitStore>) =
            match config.store.backend {
                StoreBackend::Memory => {
                    info!("Using in-memory stores");
                    (
                        Arc::new(InMemoryCredentialStore::new()),
                        Arc::new(InMemoryRateLimitStore::new()),
                    )
                }
                StoreBackend::Redis => {
                    let connection = redis_store::connect(&config.store).await?;
                    let namespace = RedisNamespace::new(config.store.key_prefix.clone());
                    info!("Using Redis stores");
                    (
                        Arc::new(RedisCredentialStore::new(
                            connection.clone(),
                            namespace.clone(),
                        )),
                        Arc::new(RedisRateLimitStore::new(connection, namespace)),
                    )
                }
            };

        Ok(Self::with_stores(
            config,
            AuthCoreDeps {
                credentials,
                rate_limits,
                audit: Arc::new(TracingAuditSink::new()),
                clock: Arc::new(SystemClock),
            },
        ))
    }

    /// Wire the components over explicit stores, audit sink and clock.
    /// The config is assumed to be validated.
    pub fn with_stores(config: &AppConfig, deps: AuthCoreDeps) -> Self {
        let store_timeout = config.store.timeout();
        let tokens = Arc::new(SessionTokenService::new(&config.auth));

        let issuer = KeyIssuer::new(
            deps.credentials.clone(),
            deps.audit.clone(),
            deps.clock.clone(),
            KeyIssuerSettings::from_config(config),
        );
        let exchanger = TokenExchanger::new(
            deps.credentials.clone(),
            tokens.clone(),
            deps.audit.clone(),
            deps.clock.clone(),
            store_timeout,
        );
        let authorizer = Authorizer::new(
            deps.credentials,
            tokens,
            deps.audit.clone(),
            deps.clock.clone(),
            store_timeout,
        );
        let rate_limiter = RateLimiter::new(
            deps.rate_limits,
            deps.audit,
            deps.clock,
            RateLimiterSettings::from_config(config),
        );

        Self {
            issuer: Arc::new(issuer),
            exchanger: Arc::new(exchanger),
            authorizer: Arc::new(authorizer),
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    pub async fn issue_key(&self, request: IssueKeyRequest) -> Result<IssuedKey, AuthError> {
        self.issuer.issue_key(request).await
    }

    pub async fn revoke_key(&self, key_id: &ApiKeyId) -> Result<(), AuthError> {
        self.issuer.revoke_key(key_id).await
    }

    pub async fn get_key(&self, key_id: &ApiKeyId) -> Result<ApiKey, AuthError> {
        self.issuer.get_key(key_id).await
    }

    pub async fn list_keys(&self, owner_id: &str) -> Result<Vec<ApiKey>, AuthError> {
        self.issuer.list_keys(owner_id).await
    }

    pub async fn exchange(&self, secret: &str) -> Result<SessionToken, AuthError> {
        self.exchanger.exchange(secret).await
    }

    pub async fn authorize(
        &self,
        token: &str,
        action: &RequestedAction,
    ) -> Result<AuthorizationDecision, AuthError> {
        self.authorizer.authorize(token, action).await
    }

    /// Consume against the configured default limit. This ignores any
    /// per-key override; callers holding an [`AuthorizationDecision`] pass
    /// its `rate_limit_override` to [`Self::check_and_consume_with_limit`].
    pub async fn check_and_consume(&self, key_id: &str) -> Result<RateLimitStatus, AuthError> {
        self.rate_limiter.check_and_consume(key_id).await
    }

    /// Consume against the key's own override when it has one, looking the
    /// key up first
    pub async fn check_and_consume_for_key(
        &self,
        key_id: &ApiKeyId,
    ) -> Result<RateLimitStatus, AuthError> {
        let key = self.issuer.get_key(key_id).await?;
        let limit = key
            .rate_limit_override()
            .unwrap_or_else(|| self.rate_limiter.default_limit());
        self.rate_limiter
            .check_and_consume_with_limit(key_id.as_str(), limit)
            .await
    }

    pub async fn check_and_consume_with_limit(
        &self,
        key_id: &str,
        limit: u32,
    ) -> Result<RateLimitStatus, AuthError> {
        self.rate_limiter
            .check_and_consume_with_limit(key_id, limit)
            .await
    }

    pub async fn reset_rate_limit(&self, key_id: &str) -> Result<(), AuthError> {
        self.rate_limiter.reset(key_id).await
    }

    /// Dispatcher sharing this core's authorizer and rate limiter
    pub fn dispatcher(&self, registry: ToolRegistry) -> ToolDispatcher {
        ToolDispatcher::new(
            Arc::new(registry),
            self.authorizer.clone(),
            self.rate_limiter.clone(),
        )
    }
}
