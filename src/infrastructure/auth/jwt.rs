//! Session token signing and verification

use std::fmt::{self, Debug};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::config::{AuthConfig, SigningAlgorithm};
use crate::domain::api_key::ApiKey;
use crate::domain::{AuthError, SessionClaims, SessionToken};

impl From<SigningAlgorithm> for Algorithm {
    fn from(algorithm: SigningAlgorithm) -> Self {
        match algorithm {
            SigningAlgorithm::Hs256 => Algorithm::HS256,
            SigningAlgorithm::Hs384 => Algorithm::HS384,
            SigningAlgorithm::Hs512 => Algorithm::HS512,
        }
    }
}

/// HMAC-signed session tokens.
///
/// Expiry is checked against the caller's clock reading rather than the
/// library's wall clock, so a token is expired exactly when
/// `now >= exp`.
#[derive(Clone)]
pub struct SessionTokenService {
    algorithm: Algorithm,
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for SessionTokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenService")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl SessionTokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.secret_key.as_bytes();

        Self {
            algorithm: config.algorithm.into(),
            issuer: config.issuer.clone(),
            ttl: config.token_ttl(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for a key, expiring at `now + ttl` or the key's own
    /// expiry, whichever comes first
    pub fn sign(&self, key: &ApiKey, now: DateTime<Utc>) -> Result<SessionToken, AuthError> {
        let claims = SessionClaims::for_key(key, &self.issuer, now, self.ttl);

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("Failed to sign session token: {}", e)))?;

        Ok(SessionToken::new(token, claims))
    }

    /// Check signature, structure and issuer, then expiry against `now`
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "Session token rejected");
            AuthError::InvalidToken
        })?;

        if data.claims.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }

        Ok(data.claims)
    }
}
