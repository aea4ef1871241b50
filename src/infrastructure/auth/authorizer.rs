//! Session token authorization

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::api_key::{ApiKeyId, CredentialStore};
use crate::domain::{
    AuditAction, AuditEvent, AuditSink, AuthError, AuthorizationDecision, Clock, RequestedAction,
    SessionClaims,
};
use crate::infrastructure::store::bounded;

use super::jwt::SessionTokenService;

/// Decides whether a session token may perform a requested action.
///
/// Checks run in a fixed order: signature, expiry, live revocation
/// lookup, scope, restrictions. The first failure is the one reported.
#[derive(Debug)]
pub struct Authorizer {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<SessionTokenService>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl Authorizer {
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
            store_timeout,
        }
    }

    pub async fn authorize(
        &self,
        token: &str,
        action: &RequestedAction,
    ) -> Result<AuthorizationDecision, AuthError> {
        let now = self.clock.now();

        let claims = match self.tokens.verify(token, now) {
            Ok(claims) => claims,
            Err(e) => {
                self.audit
                    .record(
                        AuditEvent::deny(AuditAction::Authorize, now, e.reason_code())
                            .with_scope(action.required_scope),
                    )
                    .await;
                return Err(e);
            }
        };

        let result = self.check(&claims, action, now).await;

        let event = match &result {
            Ok(_) => AuditEvent::allow(AuditAction::Authorize, now),
            Err(e) => AuditEvent::deny(AuditAction::Authorize, now, e.reason_code()),
        };
        self.audit
            .record(
                event
                    .with_key(claims.key_id())
                    .with_owner(&claims.owner)
                    .with_scope(action.required_scope),
            )
            .await;

        if let Err(e) = &result {
            debug!(key_id = claims.key_id(), reason = e.reason_code(), "Authorization denied");
        }

        result
    }

    async fn check(
        &self,
        claims: &SessionClaims,
        action: &RequestedAction,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationDecision, AuthError> {
        let key_id = ApiKeyId::new(claims.key_id()).map_err(|_| AuthError::InvalidToken)?;

        let key = bounded(self.store_timeout, "get", self.store.get(&key_id))
            .await?
            .ok_or(AuthError::RevokedCredential)?;

        if key.is_revoked() {
            return Err(AuthError::RevokedCredential);
        }

        if key.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }

        if !claims.scope.satisfies(action.required_scope) {
            return Err(AuthError::InsufficientScope {
                required: action.required_scope,
                granted: claims.scope,
            });
        }

        if !claims
            .restrictions
            .allows(action.guild_id.as_deref(), action.channel_id.as_deref())
        {
            return Err(AuthError::ScopeRestricted);
        }

        Ok(AuthorizationDecision {
            key_id,
            owner_id: claims.owner.clone(),
            scope: claims.scope,
            rate_limit_override: key.rate_limit_override(),
            token_expires_at: claims.expires_at(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::domain::api_key::{ApiKey, MockCredentialStore, Restriction, RestrictionSet, Scope};
    use crate::domain::{AuditOutcome, DomainError, ManualClock};
    use crate::infrastructure::api_key::InMemoryCredentialStore;
    use crate::infrastructure::audit::InMemoryAuditSink;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    struct Fixture {
        authorizer: Authorizer,
        store: Arc<InMemoryCredentialStore>,
        audit: Arc<InMemoryAuditSink>,
        clock: Arc<ManualClock>,
        tokens: Arc<SessionTokenService>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let tokens = Arc::new(SessionTokenService::new(&AuthConfig {
            secret_key: "test-secret-key-0123456789abcdef".to_string(),
            ..AuthConfig::default()
        }));
        let authorizer = Authorizer::new(
            store.clone(),
            tokens.clone(),
            audit.clone(),
            clock.clone(),
            Duration::from_millis(500),
        );

        Fixture {
            authorizer,
            store,
            audit,
            clock,
            tokens,
        }
    }

    async fn token_for(f: &Fixture, scope: Scope, restrictions: RestrictionSet) -> (ApiKey, String) {
        let now = f.clock.now();
        let key = ApiKey::new(
            ApiKeyId::new("key-1").unwrap(),
            "hash-1",
            "owner-1",
            scope,
            now,
            now + ChronoDuration::hours(24),
        )
        .unwrap()
        .with_restrictions(restrictions)
        .with_rate_limit_override(7);
        f.store.put(&key).await.unwrap();

        let token = f.tokens.sign(&key, now).unwrap().into_string();
        (key, token)
    }

    #[tokio::test]
    async fn test_scope_ordering_is_enforced() {
        let f = fixture();
        let (_, token) = token_for(&f, Scope::ReadWrite, RestrictionSet::unrestricted()).await;

        for allowed in [Scope::ReadOnly, Scope::ReadWrite] {
            let decision = f
                .authorizer
                .authorize(&token, &RequestedAction::new(allowed))
                .await
                .unwrap();
            assert_eq!(decision.scope, Scope::ReadWrite);
            assert_eq!(decision.rate_limit_override, Some(7));
        }

        let denied = f
            .authorizer
            .authorize(&token, &RequestedAction::new(Scope::Moderate))
            .await;
        assert_eq!(
            denied,
            Err(AuthError::InsufficientScope {
                required: Scope::Moderate,
                granted: Scope::ReadWrite,
            })
        );
    }

    #[tokio::test]
    async fn test_channel_restriction() {
        let f = fixture();
        let restrictions = [Restriction::channel("G1", "C1").unwrap()].into_iter().collect();
        let (_, token) = token_for(&f, Scope::ReadOnly, restrictions).await;

        let allowed = RequestedAction::new(Scope::ReadOnly).in_guild("G1").in_channel("C1");
        assert!(f.authorizer.authorize(&token, &allowed).await.is_ok());

        for (guild, channel) in [("G2", "C2"), ("G1", "C2"), ("G2", "C1")] {
            let action = RequestedAction::new(Scope::ReadOnly)
                .in_guild(guild)
                .in_channel(channel);
            assert_eq!(
                f.authorizer.authorize(&token, &action).await,
                Err(AuthError::ScopeRestricted)
            );
        }

        let no_target = RequestedAction::new(Scope::ReadOnly);
        assert_eq!(
            f.authorizer.authorize(&token, &no_target).await,
            Err(AuthError::ScopeRestricted)
        );
    }

    #[tokio::test]
    async fn test_scope_checked_before_restrictions() {
        let f = fixture();
        let restrictions = [Restriction::guild("G1").unwrap()].into_iter().collect();
        let (_, token) = token_for(&f, Scope::ReadOnly, restrictions).await;

        let action = RequestedAction::new(Scope::Moderate).in_guild("G2");
        assert!(matches!(
            f.authorizer.authorize(&token, &action).await,
            Err(AuthError::InsufficientScope { .. })
        ));
    }

    #[tokio::test]
    async fn test_revocation_applies_to_issued_tokens() {
        let f = fixture();
        let (key, token) = token_for(&f, Scope::Moderate, RestrictionSet::unrestricted()).await;
        let action = RequestedAction::new(Scope::ReadOnly);

        assert!(f.authorizer.authorize(&token, &action).await.is_ok());

        f.store.mark_revoked(key.key_id(), f.clock.now()).await.unwrap();
        assert_eq!(
            f.authorizer.authorize(&token, &action).await,
            Err(AuthError::RevokedCredential)
        );
    }

    #[tokio::test]
    async fn test_missing_key_record_is_treated_as_revoked() {
        let f = fixture();
        let now = f.clock.now();
        let orphan = ApiKey::new(
            ApiKeyId::new("key-gone").unwrap(),
            "hash-x",
            "owner-1",
            Scope::ReadOnly,
            now,
            now + ChronoDuration::hours(1),
        )
        .unwrap();
        let token = f.tokens.sign(&orphan, now).unwrap().into_string();

        assert_eq!(
            f.authorizer
                .authorize(&token, &RequestedAction::new(Scope::ReadOnly))
                .await,
            Err(AuthError::RevokedCredential)
        );
    }

    #[tokio::test]
    async fn test_expired_token() {
        let f = fixture();
        let (_, token) = token_for(&f, Scope::ReadOnly, RestrictionSet::unrestricted()).await;

        f.clock.advance(ChronoDuration::seconds(900));
        assert_eq!(
            f.authorizer
                .authorize(&token, &RequestedAction::new(Scope::ReadOnly))
                .await,
            Err(AuthError::TokenExpired)
        );
    }

    #[tokio::test]
    async fn test_malformed_token_audited() {
        let f = fixture();

        let result = f
            .authorizer
            .authorize("garbage", &RequestedAction::new(Scope::ReadOnly))
            .await;
        assert_eq!(result, Err(AuthError::InvalidToken));

        let events = f.audit.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Deny);
        assert_eq!(events[0].reason, Some("invalid_token"));
        assert_eq!(events[0].key_id, None);
    }

    #[tokio::test]
    async fn test_decisions_are_audited_with_key() {
        let f = fixture();
        let (_, token) = token_for(&f, Scope::ReadOnly, RestrictionSet::unrestricted()).await;

        f.authorizer
            .authorize(&token, &RequestedAction::new(Scope::ReadOnly))
            .await
            .unwrap();
        let _ = f
            .authorizer
            .authorize(&token, &RequestedAction::new(Scope::Moderate))
            .await;

        let events = f.audit.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].outcome, AuditOutcome::Allow);
        assert_eq!(events[1].reason, Some("insufficient_scope"));
        assert!(events.iter().all(|e| e.key_id.as_deref() == Some("key-1")));
    }

    /// Authorizer over `store` with a short timeout, plus a token for a
    /// live read-write key
    fn over_store(store: Arc<dyn CredentialStore>) -> (Authorizer, Arc<InMemoryAuditSink>, String) {
        let f = fixture();
        let now = f.clock.now();
        let key = ApiKey::new(
            ApiKeyId::new("key-1").unwrap(),
            "hash-1",
            "owner-1",
            Scope::ReadWrite,
            now,
            now + ChronoDuration::hours(24),
        )
        .unwrap();
        let token = f.tokens.sign(&key, now).unwrap().into_string();

        let audit = Arc::new(InMemoryAuditSink::new());
        let authorizer = Authorizer::new(
            store,
            f.tokens,
            audit.clone(),
            f.clock,
            Duration::from_millis(20),
        );
        (authorizer, audit, token)
    }

    #[tokio::test]
    async fn test_store_failure_denies() {
        let mut store = MockCredentialStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Err(DomainError::storage("connection reset")));
        let (authorizer, audit, token) = over_store(Arc::new(store));

        let result = authorizer
            .authorize(&token, &RequestedAction::new(Scope::ReadOnly))
            .await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable { .. })));

        let events = audit.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Deny);
        assert_eq!(events[0].reason, Some("store_unavailable"));
        assert_eq!(events[0].key_id.as_deref(), Some("key-1"));
    }

    #[derive(Debug)]
    struct HangingStore;

    #[async_trait]
    impl CredentialStore for HangingStore {
        async fn get_by_hash(&self, _: &str) -> Result<Option<ApiKey>, DomainError> {
            std::future::pending().await
        }
        async fn get(&self, _: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
            std::future::pending().await
        }
        async fn put(&self, _: &ApiKey) -> Result<(), DomainError> {
            std::future::pending().await
        }
        async fn mark_revoked(&self, _: &ApiKeyId, _: DateTime<Utc>) -> Result<bool, DomainError> {
            std::future::pending().await
        }
        async fn record_usage(&self, _: &ApiKeyId, _: DateTime<Utc>) -> Result<(), DomainError> {
            std::future::pending().await
        }
        async fn list_by_owner(&self, _: &str) -> Result<Vec<ApiKey>, DomainError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_store_timeout_denies() {
        let (authorizer, audit, token) = over_store(Arc::new(HangingStore));

        let result = authorizer
            .authorize(&token, &RequestedAction::new(Scope::ReadOnly))
            .await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable { .. })));
        assert!(audit.events().await[0].is_denied());
    }
}
