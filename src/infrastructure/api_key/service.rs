//! Key issuance and management

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::domain::api_key::{
    validate_owner_id, ApiKey, ApiKeyId, CredentialStore, RestrictionSet, Scope,
};
use crate::domain::{AuditAction, AuditEvent, AuditSink, AuthError, Clock};
use crate::infrastructure::store::bounded;

use super::generator::ApiKeyGenerator;

/// Parameters of a new key
#[derive(Debug, Clone)]
pub struct IssueKeyRequest {
    pub owner_id: String,
    pub scope: Scope,
    pub restrictions: RestrictionSet,
    /// Lifetime; the configured default applies when absent
    pub ttl: Option<Duration>,
    pub label: Option<String>,
    pub rate_limit_override: Option<u32>,
}

impl IssueKeyRequest {
    pub fn new(owner_id: impl Into<String>, scope: Scope) -> Self {
        Self {
            owner_id: owner_id.into(),
            scope,
            restrictions: RestrictionSet::unrestricted(),
            ttl: None,
            label: None,
            rate_limit_override: None,
        }
    }

    pub fn with_restrictions(mut self, restrictions: RestrictionSet) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_rate_limit_override(mut self, limit: u32) -> Self {
        self.rate_limit_override = Some(limit);
        self
    }
}

/// A newly issued key. The plaintext secret exists only here.
pub struct IssuedKey {
    pub api_key: ApiKey,
    pub secret: String,
}

impl fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedKey")
            .field("api_key", &self.api_key)
            .field("secret", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct KeyIssuerSettings {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
    pub store_timeout: StdDuration,
}

impl KeyIssuerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_ttl: config.auth.key_default_ttl(),
            max_ttl: config.auth.key_max_ttl(),
            store_timeout: config.store.timeout(),
        }
    }
}

#[derive(Debug)]
pub struct KeyIssuer {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    generator: ApiKeyGenerator,
    settings: KeyIssuerSettings,
}

impl KeyIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        settings: KeyIssuerSettings,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            generator: ApiKeyGenerator::default(),
            settings,
        }
    }

    pub fn with_generator(mut self, generator: ApiKeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Generate, hash and persist a new key. The returned secret is not
    /// recoverable afterwards.
    pub async fn issue_key(&self, request: IssueKeyRequest) -> Result<IssuedKey, AuthError> {
        let now = self.clock.now();

        let (api_key, secret) = match self.build_key(&request, now) {
            Ok(built) => built,
            Err(e) => {
                self.audit
                    .record(
                        AuditEvent::deny(AuditAction::KeyIssued, now, e.reason_code())
                            .with_owner(&request.owner_id)
                            .with_scope(request.scope),
                    )
                    .await;
                return Err(e);
            }
        };

        if let Err(e) = bounded(self.settings.store_timeout, "put", self.store.put(&api_key)).await {
            self.audit
                .record(
                    AuditEvent::deny(AuditAction::KeyIssued, now, e.reason_code())
                        .with_key(api_key.key_id().as_str())
                        .with_owner(api_key.owner_id())
                        .with_scope(api_key.scope()),
                )
                .await;
            return Err(e);
        }

        info!(
            key_id = %api_key.key_id(),
            owner_id = %api_key.owner_id(),
            scope = %api_key.scope(),
            expires_at = %api_key.expires_at(),
            "API key issued"
        );

        self.audit
            .record(
                AuditEvent::allow(AuditAction::KeyIssued, now)
                    .with_key(api_key.key_id().as_str())
                    .with_owner(api_key.owner_id())
                    .with_scope(api_key.scope()),
            )
            .await;

        Ok(IssuedKey { api_key, secret })
    }

    fn build_key(
        &self,
        request: &IssueKeyRequest,
        now: DateTime<Utc>,
    ) -> Result<(ApiKey, String), AuthError> {
        validate_owner_id(&request.owner_id).map_err(|e| AuthError::validation(e.to_string()))?;
        request
            .restrictions
            .validate()
            .map_err(|e| AuthError::validation(e.to_string()))?;

        let ttl = request.ttl.unwrap_or(self.settings.default_ttl);
        if ttl <= Duration::zero() {
            return Err(AuthError::validation("ttl must be positive"));
        }
        if ttl > self.settings.max_ttl {
            return Err(AuthError::validation(format!(
                "ttl exceeds the maximum of {} hours",
                self.settings.max_ttl.num_hours()
            )));
        }

        if request.rate_limit_override == Some(0) {
            return Err(AuthError::validation("rate_limit_override must be positive"));
        }

        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::validation("ttl overflows the key expiry"))?;

        let generated = self
            .generator
            .generate()
            .map_err(|e| AuthError::internal(e.to_string()))?;

        let mut api_key = ApiKey::new(
            generated.key_id,
            generated.hash,
            request.owner_id.clone(),
            request.scope,
            now,
            expires_at,
        )
        .map_err(|e| AuthError::validation(e.to_string()))?
        .with_restrictions(request.restrictions.clone());

        if let Some(label) = &request.label {
            api_key = api_key.with_label(label.clone());
        }
        if let Some(limit) = request.rate_limit_override {
            api_key = api_key.with_rate_limit_override(limit);
        }

        Ok((api_key, generated.secret))
    }

    /// Revoke a key. Revoking twice is a no-op.
    pub async fn revoke_key(&self, key_id: &ApiKeyId) -> Result<(), AuthError> {
        let now = self.clock.now();

        let found = match bounded(
            self.settings.store_timeout,
            "mark_revoked",
            self.store.mark_revoked(key_id, now),
        )
        .await
        {
            Ok(found) => found,
            Err(e) => {
                self.audit
                    .record(
                        AuditEvent::deny(AuditAction::KeyRevoked, now, e.reason_code())
                            .with_key(key_id.as_str()),
                    )
                    .await;
                return Err(e);
            }
        };

        if !found {
            debug!(key_id = %key_id, "Revocation of unknown key");
            return Err(AuthError::not_found(key_id.as_str()));
        }

        info!(key_id = %key_id, "API key revoked");
        self.audit
            .record(AuditEvent::allow(AuditAction::KeyRevoked, now).with_key(key_id.as_str()))
            .await;

        Ok(())
    }

    pub async fn get_key(&self, key_id: &ApiKeyId) -> Result<ApiKey, AuthError> {
        bounded(self.settings.store_timeout, "get", self.store.get(key_id))
            .await?
            .ok_or_else(|| AuthError::not_found(key_id.as_str()))
    }

    pub async fn list_keys(&self, owner_id: &str) -> Result<Vec<ApiKey>, AuthError> {
        bounded(
            self.settings.store_timeout,
            "list_by_owner",
            self.store.list_by_owner(owner_id),
        )
        .await
    }

    pub fn generator(&self) -> &ApiKeyGenerator {
        &self.generator
    }
}
