use std::time::Duration;

use thiserror::Error;

use super::api_key::Scope;

/// Infrastructure-level errors returned by stores and adapters
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Typed failures of the authorization core.
///
/// Every variant is terminal for the current request. The dispatch layer
/// maps them to transport responses; authorization-phase denials are all
/// surfaced to end users as a generic "forbidden".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown, revoked or expired key presented at exchange time.
    /// Deliberately undifferentiated.
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid session token")]
    InvalidToken,

    #[error("Session token expired")]
    TokenExpired,

    #[error("Credential has been revoked")]
    RevokedCredential,

    #[error("Insufficient scope: requires {required}, credential grants {granted}")]
    InsufficientScope { required: Scope, granted: Scope },

    #[error("Credential is not permitted for the requested guild/channel")]
    ScopeRestricted,

    #[error("Rate limit of {limit} requests exceeded, retry after {}s", retry_after_secs(.retry_after))]
    RateLimitExceeded { retry_after: Duration, limit: u32 },

    #[error("Credential store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("API key '{key_id}' not found")]
    NotFound { key_id: String },

    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn retry_after_secs(retry_after: &Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl AuthError {
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(key_id: impl Into<String>) -> Self {
        Self::NotFound {
            key_id: key_id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable reason code recorded in audit entries
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::RevokedCredential => "revoked_credential",
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::ScopeRestricted => "scope_restricted",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::Internal { .. } => "internal",
        }
    }

    /// Authorization-phase denials, all reported to end users as "forbidden"
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken
                | Self::TokenExpired
                | Self::RevokedCredential
                | Self::InsufficientScope { .. }
                | Self::ScopeRestricted
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::RateLimitExceeded { .. }
        )
    }

    /// Retry guidance in whole seconds, rounded up
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => Some(retry_after_secs(retry_after)),
            _ => None,
        }
    }
}
