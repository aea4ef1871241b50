//! API key entity and related types

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_api_key_id, validate_owner_id, ApiKeyValidationError};

/// API key identifier - alphanumeric + hyphens, max 50 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKeyId(String);

impl ApiKeyId {
    /// Create a new ApiKeyId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, ApiKeyValidationError> {
        let id = id.into();
        validate_api_key_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApiKeyId {
    type Error = ApiKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiKeyId> for String {
    fn from(id: ApiKeyId) -> Self {
        id.0
    }
}

impl fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability level of a credential.
///
/// Variants are declared in capability order so the derived `Ord` gives
/// `Moderate > ReadWrite > ReadOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    ReadOnly,
    ReadWrite,
    Moderate,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
            Self::Moderate => "moderate",
        }
    }

    /// Whether a credential holding this scope may perform an action
    /// requiring `required`
    pub fn satisfies(&self, required: Scope) -> bool {
        *self >= required
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ApiKeyValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "read_only" => Ok(Self::ReadOnly),
            "read_write" => Ok(Self::ReadWrite),
            "moderate" => Ok(Self::Moderate),
            _ => Err(ApiKeyValidationError::UnknownScope(s.to_string())),
        }
    }
}

/// A (guild, channel) pair narrowing where a credential applies.
///
/// A restriction without a channel covers every channel of the guild.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Restriction {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl Restriction {
    pub fn channel(
        guild_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Result<Self, ApiKeyValidationError> {
        let restriction = Self {
            guild_id: guild_id.into(),
            channel_id: Some(channel_id.into()),
        };
        restriction.validate()?;
        Ok(restriction)
    }

    pub fn guild(guild_id: impl Into<String>) -> Result<Self, ApiKeyValidationError> {
        let restriction = Self {
            guild_id: guild_id.into(),
            channel_id: None,
        };
        restriction.validate()?;
        Ok(restriction)
    }

    pub fn validate(&self) -> Result<(), ApiKeyValidationError> {
        if self.guild_id.trim().is_empty() {
            return Err(ApiKeyValidationError::EmptyGuild);
        }

        if matches!(&self.channel_id, Some(c) if c.trim().is_empty()) {
            return Err(ApiKeyValidationError::EmptyChannel);
        }

        Ok(())
    }

    /// Check whether a target location falls under this restriction
    pub fn matches(&self, guild_id: Option<&str>, channel_id: Option<&str>) -> bool {
        if guild_id != Some(self.guild_id.as_str()) {
            return false;
        }

        match &self.channel_id {
            None => true,
            Some(allowed) => channel_id == Some(allowed.as_str()),
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.channel_id {
            Some(channel) => write!(f, "{}:{}", self.guild_id, channel),
            None => write!(f, "{}", self.guild_id),
        }
    }
}

impl FromStr for Restriction {
    type Err = ApiKeyValidationError;

    /// Parses `guild` or `guild:channel`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((guild, channel)) => Self::channel(guild.trim(), channel.trim()),
            None => Self::guild(s.trim()),
        }
    }
}

/// Set of restrictions; empty means unrestricted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestrictionSet(BTreeSet<Restriction>);

impl RestrictionSet {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Restriction> {
        self.0.iter()
    }

    pub fn insert(&mut self, restriction: Restriction) -> bool {
        self.0.insert(restriction)
    }

    pub fn validate(&self) -> Result<(), ApiKeyValidationError> {
        self.0.iter().try_for_each(Restriction::validate)
    }

    /// An unrestricted set allows every target; otherwise at least one
    /// entry must match
    pub fn allows(&self, guild_id: Option<&str>, channel_id: Option<&str>) -> bool {
        self.0.is_empty() || self.0.iter().any(|r| r.matches(guild_id, channel_id))
    }
}

impl FromIterator<Restriction> for RestrictionSet {
    fn from_iter<I: IntoIterator<Item = Restriction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// API key record as held by the credential store.
///
/// The plaintext secret is never part of this record; only its hash is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    key_id: ApiKeyId,
    /// Lowercase hex SHA-256 of the secret
    key_hash: String,
    owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    scope: Scope,
    #[serde(default)]
    restrictions: RestrictionSet,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    /// Requests per window replacing the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate_limit_override: Option<u32>,
}

impl ApiKey {
    /// Create a new, unrevoked API key record
    pub fn new(
        key_id: ApiKeyId,
        key_hash: impl Into<String>,
        owner_id: impl Into<String>,
        scope: Scope,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, ApiKeyValidationError> {
        let owner_id = owner_id.into();
        validate_owner_id(&owner_id)?;

        if expires_at <= issued_at {
            return Err(ApiKeyValidationError::ExpiryNotAfterIssue);
        }

        Ok(Self {
            key_id,
            key_hash: key_hash.into(),
            owner_id,
            label: None,
            scope,
            restrictions: RestrictionSet::default(),
            issued_at,
            expires_at,
            revoked: false,
            revoked_at: None,
            last_used_at: None,
            rate_limit_override: None,
        })
    }

    /// Set restrictions
    pub fn with_restrictions(mut self, restrictions: RestrictionSet) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Set a human-readable label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set a per-key rate limit
    pub fn with_rate_limit_override(mut self, limit: u32) -> Self {
        self.rate_limit_override = Some(limit);
        self
    }

    // Getters

    pub fn key_id(&self) -> &ApiKeyId {
        &self.key_id
    }

    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn restrictions(&self) -> &RestrictionSet {
        &self.restrictions
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn rate_limit_override(&self) -> Option<u32> {
        self.rate_limit_override
    }

    // Status checks

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the key is usable at the given instant
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    // Mutators

    /// Revoke the key. Revocation is monotonic; revoking again keeps the
    /// original timestamp.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        if !self.revoked {
            self.revoked = true;
            self.revoked_at = Some(at);
        }
    }

    /// Record key usage
    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.last_used_at = Some(at);
    }
}
