//! Timeout-bounded store calls
//!
//! Every call the core makes to a backing store goes through [`bounded`].
//! Store errors and timeouts both surface as `StoreUnavailable`, so an
//! unreachable store denies instead of allowing.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::{AuthError, DomainError};

pub async fn bounded<T, F>(timeout: Duration, operation: &'static str, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(operation, error = %e, "Store call failed");
            Err(AuthError::store_unavailable(format!("{}: {}", operation, e)))
        }
        Err(_) => {
            warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Store call timed out"
            );
            Err(AuthError::store_unavailable(format!(
                "{} timed out after {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
