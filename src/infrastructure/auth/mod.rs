//! Session token infrastructure
//!
//! Token signing, API key exchange and per-request authorization.

mod authorizer;
mod exchanger;
mod jwt;

pub use authorizer::Authorizer;
pub use exchanger::TokenExchanger;
pub use jwt::SessionTokenService;
