//! API key generation
//!
//! Secrets are `dmk_` followed by base64url-encoded random bytes. Only the
//! lowercase hex SHA-256 of the full secret is ever stored.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::api_key::ApiKeyId;
use crate::domain::DomainError;

/// Minimum random bytes per secret (256 bits)
pub const MIN_KEY_BYTES: usize = 32;

/// Freshly generated credential material
#[derive(Clone)]
pub struct GeneratedApiKey {
    pub key_id: ApiKeyId,
    /// Plaintext secret, handed to the caller once
    pub secret: String,
    pub hash: String,
}

impl fmt::Debug for GeneratedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedApiKey")
            .field("key_id", &self.key_id)
            .field("secret", &"[redacted]")
            .field("hash", &self.hash)
            .finish()
    }
}

/// Generator for API key secrets and identifiers
#[derive(Debug, Clone)]
pub struct ApiKeyGenerator {
    prefix: String,
    key_bytes: usize,
}

impl ApiKeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            key_bytes: MIN_KEY_BYTES,
        }
    }

    /// Use more random bytes per secret. Values below 32 are raised to 32.
    pub fn with_key_bytes(mut self, bytes: usize) -> Self {
        self.key_bytes = bytes.max(MIN_KEY_BYTES);
        self
    }

    pub fn generate(&self) -> Result<GeneratedApiKey, DomainError> {
        let mut entropy = vec![0u8; self.key_bytes];
        rand::thread_rng().fill_bytes(&mut entropy);

        let secret = format!("{}{}", self.prefix, URL_SAFE_NO_PAD.encode(&entropy));
        let hash = self.hash_secret(&secret);

        let key_id = ApiKeyId::new(format!("key-{}", Uuid::new_v4().simple()))
            .map_err(|e| DomainError::internal(format!("Generated an invalid key id: {}", e)))?;

        Ok(GeneratedApiKey {
            key_id,
            secret,
            hash,
        })
    }

    /// Lowercase hex SHA-256 of a secret
    pub fn hash_secret(&self, secret: &str) -> String {
        hex::encode(Sha256::digest(secret.as_bytes()))
    }

    /// Check a presented secret against a stored hash in constant time
    pub fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        constant_time_compare(&self.hash_secret(secret), stored_hash)
    }
}

impl Default for ApiKeyGenerator {
    fn default() -> Self {
        Self::new("dmk_")
    }
}

/// Equality whose running time depends only on the input lengths
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
