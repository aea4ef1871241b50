//! Infrastructure layer - store backends, token handling and tool dispatch

pub mod api_key;
pub mod audit;
pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod redis;
pub mod store;
pub mod tools;
