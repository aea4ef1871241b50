//! API key infrastructure
//!
//! Secret generation, the credential stores and the key issuer.

mod generator;
mod redis_repository;
mod repository;
mod service;

pub use generator::{constant_time_compare, ApiKeyGenerator, GeneratedApiKey, MIN_KEY_BYTES};
pub use redis_repository::RedisCredentialStore;
pub use repository::InMemoryCredentialStore;
pub use service::{IssueKeyRequest, IssuedKey, KeyIssuer, KeyIssuerSettings};
