//! Audit trail of authorization decisions
//!
//! Entries carry identifiers, the decision and a reason code only. Secrets
//! and token material never enter an audit event.

use std::fmt::{self, Debug};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::api_key::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    KeyIssued,
    KeyRevoked,
    TokenIssued,
    Authorize,
    RateLimit,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyIssued => "key_issued",
            Self::KeyRevoked => "key_revoked",
            Self::TokenIssued => "token_issued",
            Self::Authorize => "authorize",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allow,
    Deny,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// One append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl AuditEvent {
    pub fn allow(action: AuditAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            action,
            outcome: AuditOutcome::Allow,
            key_id: None,
            owner_id: None,
            scope: None,
            reason: None,
        }
    }

    pub fn deny(action: AuditAction, timestamp: DateTime<Utc>, reason: &'static str) -> Self {
        Self {
            outcome: AuditOutcome::Deny,
            reason: Some(reason),
            ..Self::allow(action, timestamp)
        }
    }

    pub fn with_key(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn is_denied(&self) -> bool {
        self.outcome == AuditOutcome::Deny
    }
}

/// Destination for audit records (log pipeline, metrics backend, ...)
///
/// Recording never fails the request being audited.
#[async_trait]
pub trait AuditSink: Send + Sync + Debug {
    async fn record(&self, event: AuditEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_event_carries_reason() {
        let now = Utc::now();
        let event = AuditEvent::deny(AuditAction::Authorize, now, "scope_restricted")
            .with_key("key-1")
            .with_owner("owner-1")
            .with_scope(Scope::ReadOnly);

        assert!(event.is_denied());
        assert_eq!(event.reason, Some("scope_restricted"));
        assert_eq!(event.key_id.as_deref(), Some("key-1"));
        assert_eq!(event.scope, Some(Scope::ReadOnly));
    }

    #[test]
    fn test_event_serializes_without_empty_fields() {
        let event = AuditEvent::allow(AuditAction::TokenIssued, Utc::now()).with_key("key-1");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["action"], "token_issued");
        assert_eq!(json["outcome"], "allow");
        assert!(json.get("reason").is_none());
        assert!(json.get("owner_id").is_none());
    }
}
