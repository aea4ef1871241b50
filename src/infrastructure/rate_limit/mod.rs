//! Rate limiting infrastructure

mod limiter;
mod store;

pub use limiter::{RateLimiter, RateLimiterSettings};
pub use store::{InMemoryRateLimitStore, RedisRateLimitStore};
