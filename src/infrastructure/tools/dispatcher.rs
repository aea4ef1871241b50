//! Authorized tool dispatch

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{AuthorizationDecision, RateLimitStatus, ToolError};
use crate::infrastructure::auth::Authorizer;
use crate::infrastructure::rate_limit::RateLimiter;

use super::registry::ToolRegistry;

/// Result of a tool call that passed every gate
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub decision: AuthorizationDecision,
    pub rate_limit: RateLimitStatus,
    pub output: Value,
}

/// Runs a tool call through lookup, input validation, authorization and
/// rate limiting before executing it. A denial at any gate means the
/// tool never runs.
#[derive(Debug)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    authorizer: Arc<Authorizer>,
    rate_limiter: Arc<RateLimiter>,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        authorizer: Arc<Authorizer>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            registry,
            authorizer,
            rate_limiter,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        token: &str,
        tool_name: &str,
        input: Value,
    ) -> Result<DispatchOutcome, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let action = tool.target(&input)?;
        let decision = self.authorizer.authorize(token, &action).await?;

        let limit = decision
            .rate_limit_override
            .unwrap_or_else(|| self.rate_limiter.default_limit());
        let rate_limit = self
            .rate_limiter
            .check_and_consume_with_limit(decision.key_id.as_str(), limit)
            .await?;

        let output = tool.execute(input).await.inspect_err(|e| {
            warn!(
                tool = tool_name,
                key_id = %decision.key_id,
                error = %e,
                "Tool execution failed"
            );
        })?;

        info!(
            tool = tool_name,
            key_id = %decision.key_id,
            remaining = rate_limit.remaining,
            "Tool executed"
        );

        Ok(DispatchOutcome {
            decision,
            rate_limit,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::domain::api_key::{ApiKey, ApiKeyId, Restriction, RestrictionSet, Scope};
    use crate::domain::tool::MockDiscordGateway;
    use crate::domain::{AuthError, Clock, CredentialStore, ManualClock};
    use crate::infrastructure::api_key::InMemoryCredentialStore;
    use crate::infrastructure::audit::InMemoryAuditSink;
    use crate::infrastructure::auth::SessionTokenService;
    use crate::infrastructure::rate_limit::{InMemoryRateLimitStore, RateLimiterSettings};
    use chrono::{DateTime, Duration};
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemoryCredentialStore>,
        tokens: Arc<SessionTokenService>,
        clock: Arc<ManualClock>,
        authorizer: Arc<Authorizer>,
        rate_limiter: Arc<RateLimiter>,
    }

    fn fixture(limit: u32) -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let tokens = Arc::new(SessionTokenService::new(&AuthConfig {
            secret_key: "dispatch-secret-0123456789abcdef".to_string(),
            ..AuthConfig::default()
        }));
        let timeout = std::time::Duration::from_millis(500);

        let authorizer = Arc::new(Authorizer::new(
            store.clone(),
            tokens.clone(),
            audit.clone(),
            clock.clone(),
            timeout,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            audit,
            clock.clone(),
            RateLimiterSettings {
                limit,
                window: Duration::seconds(60),
                store_timeout: timeout,
            },
        ));

        Fixture {
            store,
            tokens,
            clock,
            authorizer,
            rate_limiter,
        }
    }

    async fn token(f: &Fixture, scope: Scope, restrictions: RestrictionSet) -> String {
        let now = f.clock.now();
        let key = ApiKey::new(
            ApiKeyId::new("key-1").unwrap(),
            "hash-1",
            "owner-1",
            scope,
            now,
            now + Duration::hours(24),
        )
        .unwrap()
        .with_restrictions(restrictions);
        f.store.put(&key).await.unwrap();
        f.tokens.sign(&key, now).unwrap().into_string()
    }

    fn dispatcher(f: &Fixture, gateway: MockDiscordGateway) -> ToolDispatcher {
        let registry = ToolRegistry::with_builtin_tools(Arc::new(gateway)).unwrap();
        ToolDispatcher::new(
            Arc::new(registry),
            f.authorizer.clone(),
            f.rate_limiter.clone(),
        )
    }

    fn send(channel: &str) -> Value {
        json!({"guild_id": "G1", "channel_id": channel, "content": "hello"})
    }

    #[tokio::test]
    async fn test_dispatch_executes_authorized_call() {
        let f = fixture(10);
        let token = token(&f, Scope::ReadWrite, RestrictionSet::unrestricted()).await;

        let mut gateway = MockDiscordGateway::new();
        gateway
            .expect_send_message()
            .withf(|input| input.channel_id == "C1" && input.content == "hello")
            .times(1)
            .returning(|_| Ok(json!({"message_id": "M1"})));

        let outcome = dispatcher(&f, gateway)
            .dispatch(&token, "send_message", send("C1"))
            .await
            .unwrap();

        assert_eq!(outcome.output, json!({"message_id": "M1"}));
        assert_eq!(outcome.decision.key_id.as_str(), "key-1");
        assert_eq!(outcome.rate_limit.remaining, 9);
    }

    #[tokio::test]
    async fn test_insufficient_scope_never_executes() {
        let f = fixture(10);
        let token = token(&f, Scope::ReadOnly, RestrictionSet::unrestricted()).await;

        let mut gateway = MockDiscordGateway::new();
        gateway.expect_send_message().times(0);

        let err = dispatcher(&f, gateway)
            .dispatch(&token, "send_message", send("C1"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ToolError::Denied(AuthError::InsufficientScope { .. })
        ));
    }

    #[tokio::test]
    async fn test_restricted_channel_never_executes() {
        let f = fixture(10);
        let restrictions = [Restriction::channel("G1", "C1").unwrap()].into_iter().collect();
        let token = token(&f, Scope::ReadWrite, restrictions).await;

        let mut gateway = MockDiscordGateway::new();
        gateway.expect_send_message().times(0);

        let err = dispatcher(&f, gateway)
            .dispatch(&token, "send_message", send("C2"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Denied(AuthError::ScopeRestricted)));
    }

    #[tokio::test]
    async fn test_rate_limited_call_never_executes() {
        let f = fixture(1);
        let token = token(&f, Scope::ReadWrite, RestrictionSet::unrestricted()).await;

        let mut gateway = MockDiscordGateway::new();
        gateway
            .expect_send_message()
            .times(1)
            .returning(|_| Ok(json!({"message_id": "M1"})));
        let dispatcher = dispatcher(&f, gateway);

        dispatcher
            .dispatch(&token, "send_message", send("C1"))
            .await
            .unwrap();
        let err = dispatcher
            .dispatch(&token, "send_message", send("C1"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ToolError::Denied(AuthError::RateLimitExceeded { limit: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_input_consumes_no_budget() {
        let f = fixture(1);
        let token = token(&f, Scope::ReadWrite, RestrictionSet::unrestricted()).await;

        let mut gateway = MockDiscordGateway::new();
        gateway
            .expect_send_message()
            .times(1)
            .returning(|_| Ok(json!({"message_id": "M1"})));
        let dispatcher = dispatcher(&f, gateway);

        let err = dispatcher
            .dispatch(&token, "send_message", json!({"guild_id": "G1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        assert!(dispatcher
            .dispatch(&token, "send_message", send("C1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let f = fixture(10);
        let err = dispatcher(&f, MockDiscordGateway::new())
            .dispatch("irrelevant", "drop_tables", json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::UnknownTool(name) if name == "drop_tables"));
    }
}
