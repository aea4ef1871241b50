//! Tool domain
//!
//! Tools are registered explicitly at startup and share one interface:
//! validate input into a target, then execute against Discord.

mod input;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use crate::domain::api_key::Scope;
use crate::domain::session::RequestedAction;
use crate::domain::{AuthError, DomainError};

#[cfg(test)]
use mockall::automock;

pub use input::{
    GetChannelInfoInput, GetMessagesInput, ModerateContentInput, ModerationAction,
    SearchMessagesInput, SendMessageInput, MAX_FETCH_LIMIT, MAX_MESSAGE_LENGTH, MAX_TIMEOUT_SECS,
};

/// Name, description and required scope of a tool, as listed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub required_scope: Scope,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Denied(#[from] AuthError),

    #[error("Tool execution failed: {0}")]
    Execution(#[from] DomainError),
}

impl ToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Deserialize and validate a raw tool payload
pub fn parse_input<T>(input: &Value) -> Result<T, ToolError>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T =
        serde_json::from_value(input.clone()).map_err(|e| ToolError::invalid_input(e.to_string()))?;
    parsed
        .validate()
        .map_err(|e| ToolError::invalid_input(e.to_string()))?;
    Ok(parsed)
}

#[async_trait]
pub trait Tool: Send + Sync + Debug {
    fn descriptor(&self) -> ToolDescriptor;

    /// Validate the input and resolve what it touches. No side effects.
    fn target(&self, input: &Value) -> Result<RequestedAction, ToolError>;

    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

/// Discord operations backing the tools. The bot connection lives
/// outside this crate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DiscordGateway: Send + Sync + Debug {
    async fn send_message(&self, input: SendMessageInput) -> Result<Value, DomainError>;

    async fn get_messages(&self, input: GetMessagesInput) -> Result<Value, DomainError>;

    async fn get_channel_info(&self, input: GetChannelInfoInput) -> Result<Value, DomainError>;

    async fn search_messages(&self, input: SearchMessagesInput) -> Result<Value, DomainError>;

    async fn moderate(&self, input: ModerateContentInput) -> Result<Value, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_input_reports_missing_fields() {
        let err = parse_input::<GetChannelInfoInput>(&json!({"guild_id": "g1"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(msg) if msg.contains("channel_id")));
    }

    #[test]
    fn test_parse_input_runs_validation() {
        let err = parse_input::<GetChannelInfoInput>(&json!({"guild_id": "", "channel_id": "c1"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_denied_wraps_auth_error() {
        let err: ToolError = AuthError::ScopeRestricted.into();
        assert!(matches!(err, ToolError::Denied(AuthError::ScopeRestricted)));
        assert_eq!(
            err.to_string(),
            "Credential is not permitted for the requested guild/channel"
        );
    }
}
