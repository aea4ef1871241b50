//! API key validation utilities

use thiserror::Error;

/// Rejected key ids, owners, restrictions and scopes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiKeyValidationError {
    #[error("Key id is empty")]
    EmptyId,

    #[error("Key id is longer than {0} characters")]
    TooLong(usize),

    #[error("Key id must begin with an ASCII letter or digit")]
    InvalidStart,

    #[error("Key id must finish with an ASCII letter or digit")]
    InvalidEnd,

    #[error("Key id contains '{0}'; only ASCII letters, digits and '-' are permitted")]
    InvalidCharacter(char),

    #[error("Key id contains a double hyphen")]
    ConsecutiveHyphens,

    #[error("Owner ID cannot be empty")]
    EmptyOwner,

    #[error("Restriction guild ID cannot be empty")]
    EmptyGuild,

    #[error("Restriction channel ID cannot be empty")]
    EmptyChannel,

    #[error("Unknown scope '{0}'. Expected read_only, read_write or moderate")]
    UnknownScope(String),

    #[error("Key expiry must be after its issue time")]
    ExpiryNotAfterIssue,
}

const MAX_KEY_ID_LEN: usize = 50;

/// Key ids are 1-50 ASCII alphanumerics and single hyphens, starting and
/// ending with an alphanumeric.
pub fn validate_api_key_id(id: &str) -> Result<(), ApiKeyValidationError> {
    let (Some(first), Some(last)) = (id.chars().next(), id.chars().last()) else {
        return Err(ApiKeyValidationError::EmptyId);
    };

    if id.len() > MAX_KEY_ID_LEN {
        return Err(ApiKeyValidationError::TooLong(MAX_KEY_ID_LEN));
    }

    if let Some(bad) = id.chars().find(|c| *c != '-' && !c.is_ascii_alphanumeric()) {
        return Err(ApiKeyValidationError::InvalidCharacter(bad));
    }

    if !first.is_ascii_alphanumeric() {
        return Err(ApiKeyValidationError::InvalidStart);
    }

    if !last.is_ascii_alphanumeric() {
        return Err(ApiKeyValidationError::InvalidEnd);
    }

    if id.contains("--") {
        return Err(ApiKeyValidationError::ConsecutiveHyphens);
    }

    Ok(())
}

/// Validate the principal a key is issued to
pub fn validate_owner_id(owner_id: &str) -> Result<(), ApiKeyValidationError> {
    if owner_id.trim().is_empty() {
        return Err(ApiKeyValidationError::EmptyOwner);
    }

    Ok(())
}
