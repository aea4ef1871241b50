//! Audit sink implementations

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{AuditEvent, AuditOutcome, AuditSink};

/// Emits audit events as structured log records under the `audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        let key_id = event.key_id.as_deref().unwrap_or("-");
        let owner_id = event.owner_id.as_deref().unwrap_or("-");
        let scope = event.scope.map(|s| s.as_str()).unwrap_or("-");
        let reason = event.reason.unwrap_or("-");

        match event.outcome {
            AuditOutcome::Allow => info!(
                target: "audit",
                timestamp = %event.timestamp,
                action = %event.action,
                outcome = event.outcome.as_str(),
                key_id,
                owner_id,
                scope,
                "allow"
            ),
            AuditOutcome::Deny => warn!(
                target: "audit",
                timestamp = %event.timestamp,
                action = %event.action,
                outcome = event.outcome.as_str(),
                key_id,
                owner_id,
                scope,
                reason,
                "deny"
            ),
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) {
        self.events.write().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuditAction, Scope};
    use chrono::Utc;

    #[tokio::test]
    async fn test_in_memory_sink_appends() {
        let sink = InMemoryAuditSink::new();
        sink.record(AuditEvent::allow(AuditAction::TokenIssued, Utc::now()).with_key("key-1"))
            .await;
        sink.record(AuditEvent::deny(AuditAction::Authorize, Utc::now(), "invalid_token"))
            .await;

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::TokenIssued);
        assert!(events[1].is_denied());

        sink.clear().await;
        assert!(sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingAuditSink::new();
        sink.record(
            AuditEvent::deny(AuditAction::RateLimit, Utc::now(), "rate_limit_exceeded")
                .with_key("key-1")
                .with_scope(Scope::ReadOnly),
        )
        .await;
    }
}
