//! Session token claims and authorization request/decision types

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::api_key::{ApiKey, ApiKeyId, RestrictionSet, Scope};

/// Signed claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Originating API key id
    pub sub: String,
    /// Principal owning the key
    pub owner: String,
    pub scope: Scope,
    #[serde(default)]
    pub restrictions: RestrictionSet,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
    pub iss: String,
}

impl SessionClaims {
    /// Claims for a freshly exchanged key. The expiry is `now + ttl`
    /// rounded up to the next whole second, capped at the key's own
    /// expiry rounded down. A token therefore lives at least `ttl` unless
    /// the key runs out first, and never outlives the key.
    pub fn for_key(key: &ApiKey, issuer: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        let key_exp = key.expires_at().timestamp();
        let exp = now
            .checked_add_signed(ttl)
            .map_or(key_exp, |at| ceil_secs(at).min(key_exp));

        Self {
            sub: key.key_id().as_str().to_string(),
            owner: key.owner_id().to_string(),
            scope: key.scope(),
            restrictions: key.restrictions().clone(),
            iat: now.timestamp(),
            exp,
            jti: Uuid::new_v4().to_string(),
            iss: issuer.into(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

fn ceil_secs(at: DateTime<Utc>) -> i64 {
    at.timestamp() + i64::from(at.timestamp_subsec_nanos() > 0)
}

/// A minted session token. The encoded form is a bearer capability and
/// is never printed by `Debug`.
#[derive(Clone)]
pub struct SessionToken {
    token: String,
    claims: SessionClaims,
}

impl SessionToken {
    pub fn new(token: String, claims: SessionClaims) -> Self {
        Self { token, claims }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn into_string(self) -> String {
        self.token
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"[redacted]")
            .field("claims", &self.claims)
            .finish()
    }
}

/// What a caller wants to do and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAction {
    pub required_scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl RequestedAction {
    pub fn new(required_scope: Scope) -> Self {
        Self {
            required_scope,
            guild_id: None,
            channel_id: None,
        }
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn in_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }
}

/// Outcome of a successful authorization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationDecision {
    pub key_id: ApiKeyId,
    pub owner_id: String,
    pub scope: Scope,
    /// Per-key budget to apply instead of the configured default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_override: Option<u32>,
    pub token_expires_at: DateTime<Utc>,
}
