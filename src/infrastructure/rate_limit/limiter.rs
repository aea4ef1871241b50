//! Fixed-window rate limiter

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::debug;

use crate::config::AppConfig;
use crate::domain::{
    AuditAction, AuditEvent, AuditSink, AuthError, Clock, RateLimitStatus, RateLimitStore,
};
use crate::infrastructure::store::bounded;

#[derive(Debug, Clone)]
pub struct RateLimiterSettings {
    /// Default requests per window
    pub limit: u32,
    pub window: Duration,
    pub store_timeout: StdDuration,
}

impl RateLimiterSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            limit: config.rate_limit.requests,
            window: config.rate_limit.window(),
            store_timeout: config.store.timeout(),
        }
    }
}

/// Per-key request budget.
///
/// Consumption is never refunded: a request that is admitted and then
/// abandoned still counts.
#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    settings: RateLimiterSettings,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        settings: RateLimiterSettings,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            settings,
        }
    }

    pub fn default_limit(&self) -> u32 {
        self.settings.limit
    }

    pub fn window(&self) -> Duration {
        self.settings.window
    }

    pub async fn check_and_consume(&self, key_id: &str) -> Result<RateLimitStatus, AuthError> {
        self.check_and_consume_with_limit(key_id, self.settings.limit)
            .await
    }

    /// Consume one request against `limit` instead of the default
    pub async fn check_and_consume_with_limit(
        &self,
        key_id: &str,
        limit: u32,
    ) -> Result<RateLimitStatus, AuthError> {
        let now = self.clock.now();
        let window = self.settings.window;

        let snapshot = match bounded(
            self.settings.store_timeout,
            "atomic_incr_with_window",
            self.store.atomic_incr_with_window(key_id, now, window, limit),
        )
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.audit
                    .record(
                        AuditEvent::deny(AuditAction::RateLimit, now, e.reason_code())
                            .with_key(key_id),
                    )
                    .await;
                return Err(e);
            }
        };

        let reset_at = snapshot.window_start + window;

        if !snapshot.allowed {
            let retry_after = (reset_at - now).to_std().unwrap_or(StdDuration::ZERO);
            debug!(
                key_id,
                limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );

            self.audit
                .record(
                    AuditEvent::deny(AuditAction::RateLimit, now, "rate_limit_exceeded")
                        .with_key(key_id),
                )
                .await;

            return Err(AuthError::RateLimitExceeded { retry_after, limit });
        }

        self.audit
            .record(AuditEvent::allow(AuditAction::RateLimit, now).with_key(key_id))
            .await;

        Ok(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(snapshot.count),
            window_start: snapshot.window_start,
            reset_at,
        })
    }

    /// Clear a key's window
    pub async fn reset(&self, key_id: &str) -> Result<(), AuthError> {
        bounded(self.settings.store_timeout, "reset", self.store.reset(key_id)).await?;
        debug!(key_id, "Rate limit window reset");
        Ok(())
    }
}
