//! Domain layer - entities, value types and store traits

pub mod api_key;
pub mod audit;
pub mod clock;
pub mod error;
pub mod rate_limit;
pub mod session;
pub mod tool;

pub use api_key::{
    ApiKey, ApiKeyId, ApiKeyValidationError, CredentialStore, Restriction, RestrictionSet, Scope,
};
pub use audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, DomainError};
pub use rate_limit::{RateLimitStatus, RateLimitStore, RateLimitWindow, WindowSnapshot};
pub use session::{AuthorizationDecision, RequestedAction, SessionClaims, SessionToken};
pub use tool::{DiscordGateway, Tool, ToolDescriptor, ToolError};
