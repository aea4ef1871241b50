//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, LogFormat, LoggingConfig, RateLimitConfig, SigningAlgorithm,
    StoreBackend, StoreConfig, MIN_SECRET_BYTES,
};
