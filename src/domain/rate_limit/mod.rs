//! Fixed-window rate limiting domain
//!
//! A window is anchored at the first request after the previous window
//! lapsed, not at wall-clock boundaries.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Counting window for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

impl RateLimitWindow {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    pub fn has_lapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.window_start >= window
    }

    /// Apply one request to the window.
    ///
    /// Resets the window if it has lapsed, then admits the request only if
    /// `count < limit`. A rejected request leaves the count unchanged.
    pub fn consume(&mut self, now: DateTime<Utc>, window: Duration, limit: u32) -> WindowSnapshot {
        if self.has_lapsed(now, window) {
            *self = Self::starting_at(now);
        }

        let allowed = self.count < limit;
        if allowed {
            self.count += 1;
        }

        WindowSnapshot {
            window_start: self.window_start,
            count: self.count,
            allowed,
        }
    }
}

/// State observed by one atomic consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub window_start: DateTime<Utc>,
    /// Count after this request was applied
    pub count: u32,
    pub allowed: bool,
}

/// Budget information returned to admitted callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub window_start: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
}

/// Backing store for rate limit windows.
///
/// `atomic_incr_with_window` must be a single atomic read-modify-write:
/// two concurrent callers may never both observe the last free slot.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync + Debug {
    async fn atomic_incr_with_window(
        &self,
        key_id: &str,
        now: DateTime<Utc>,
        window: Duration,
        limit: u32,
    ) -> Result<WindowSnapshot, DomainError>;

    /// Drop the window for a key so the next request opens a fresh one
    async fn reset(&self, key_id: &str) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_consume_until_limit() {
        let mut window = RateLimitWindow::starting_at(t0());
        let w = Duration::seconds(60);

        for expected in 1..=3 {
            let snap = window.consume(t0(), w, 3);
            assert!(snap.allowed);
            assert_eq!(snap.count, expected);
        }

        let denied = window.consume(t0() + Duration::seconds(10), w, 3);
        assert!(!denied.allowed);
        assert_eq!(denied.count, 3);
        assert_eq!(denied.window_start, t0());
    }

    #[test]
    fn test_reset_exactly_at_boundary() {
        let mut window = RateLimitWindow::starting_at(t0());
        let w = Duration::seconds(60);
        window.consume(t0(), w, 1);

        let just_before = window.consume(t0() + Duration::milliseconds(59_999), w, 1);
        assert!(!just_before.allowed);

        let at_boundary = window.consume(t0() + w, w, 1);
        assert!(at_boundary.allowed);
        assert_eq!(at_boundary.count, 1);
        assert_eq!(at_boundary.window_start, t0() + w);
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let mut window = RateLimitWindow::starting_at(t0());
        let snap = window.consume(t0(), Duration::seconds(1), 0);
        assert!(!snap.allowed);
        assert_eq!(snap.count, 0);
    }
}
