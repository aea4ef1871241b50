//! API key to session token exchange

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::api_key::CredentialStore;
use crate::domain::{AuditAction, AuditEvent, AuditSink, AuthError, Clock, SessionToken};
use crate::infrastructure::api_key::ApiKeyGenerator;
use crate::infrastructure::store::bounded;

use super::jwt::SessionTokenService;

#[derive(Debug)]
pub struct TokenExchanger {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<SessionTokenService>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    generator: ApiKeyGenerator,
    store_timeout: Duration,
}

impl TokenExchanger {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<SessionTokenService>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            audit,
            clock,
            generator: ApiKeyGenerator::default(),
            store_timeout,
        }
    }

    pub fn with_generator(mut self, generator: ApiKeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Exchange a plaintext secret for a session token.
    ///
    /// Unknown, revoked and expired keys all fail with the same
    /// `InvalidCredential`.
    pub async fn exchange(&self, secret: &str) -> Result<SessionToken, AuthError> {
        let now = self.clock.now();
        let key_hash = self.generator.hash_secret(secret);

        let found = match bounded(
            self.store_timeout,
            "get_by_hash",
            self.store.get_by_hash(&key_hash),
        )
        .await
        {
            Ok(found) => found,
            Err(e) => {
                self.audit
                    .record(AuditEvent::deny(AuditAction::TokenIssued, now, e.reason_code()))
                    .await;
                return Err(e);
            }
        };

        let key = match found {
            Some(key) if self.generator.verify(secret, key.key_hash()) && key.is_active_at(now) => {
                key
            }
            other => {
                let mut event = AuditEvent::deny(
                    AuditAction::TokenIssued,
                    now,
                    AuthError::InvalidCredential.reason_code(),
                );
                if let Some(key) = &other {
                    debug!(key_id = %key.key_id(), revoked = key.is_revoked(), "Exchange refused");
                    event = event.with_key(key.key_id().as_str()).with_owner(key.owner_id());
                }
                self.audit.record(event).await;
                return Err(AuthError::InvalidCredential);
            }
        };

        let token = match self.tokens.sign(&key, now) {
            Ok(token) => token,
            Err(e) => {
                self.audit
                    .record(
                        AuditEvent::deny(AuditAction::TokenIssued, now, e.reason_code())
                            .with_key(key.key_id().as_str())
                            .with_owner(key.owner_id()),
                    )
                    .await;
                return Err(e);
            }
        };

        if let Err(e) = bounded(
            self.store_timeout,
            "record_usage",
            self.store.record_usage(key.key_id(), now),
        )
        .await
        {
            warn!(key_id = %key.key_id(), error = %e, "Failed to record key usage");
        }

        info!(
            key_id = %key.key_id(),
            expires_at = %token.expires_at(),
            "Session token issued"
        );

        self.audit
            .record(
                AuditEvent::allow(AuditAction::TokenIssued, now)
                    .with_key(key.key_id().as_str())
                    .with_owner(key.owner_id())
                    .with_scope(key.scope()),
            )
            .await;

        Ok(token)
    }
}
