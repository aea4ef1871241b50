//! Validated input payloads for the built-in Discord tools

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Discord's message length limit
pub const MAX_MESSAGE_LENGTH: u64 = 2000;
/// Maximum page size for history and search
pub const MAX_FETCH_LIMIT: u32 = 100;
/// Discord's maximum member timeout (28 days)
pub const MAX_TIMEOUT_SECS: u32 = 2_419_200;

fn default_fetch_limit() -> u32 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SendMessageInput {
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[validate(length(min = 1))]
    pub channel_id: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    /// Message id to reply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GetMessagesInput {
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[validate(length(min = 1))]
    pub channel_id: String,
    #[serde(default = "default_fetch_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
    /// Only messages before this message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Only messages after this message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GetChannelInfoInput {
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[validate(length(min = 1))]
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SearchMessagesInput {
    #[validate(length(min = 1))]
    pub guild_id: String,
    /// Limit the search to one channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub channel_id: Option<String>,
    /// Text the message content must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 512))]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_attachments: Option<bool>,
    #[serde(default)]
    pub pinned_only: bool,
    #[serde(default = "default_fetch_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    DeleteMessage,
    KickUser,
    BanUser,
    TimeoutUser,
    DeleteMessagesBulk,
}

impl ModerationAction {
    /// Actions operating on messages rather than members
    pub fn targets_messages(&self) -> bool {
        matches!(self, Self::DeleteMessage | Self::DeleteMessagesBulk)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_moderation"))]
pub struct ModerateContentInput {
    pub action: ModerationAction,
    /// Message id or user id depending on the action
    #[validate(length(min = 1))]
    pub target_id: String,
    #[validate(length(min = 1))]
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 512))]
    pub reason: Option<String>,
    /// Days of message history to purge on ban
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(max = 7))]
    pub delete_message_days: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 2_419_200))]
    pub timeout_duration: Option<u32>,
}

fn validate_moderation(input: &ModerateContentInput) -> Result<(), ValidationError> {
    let has_channel = input
        .channel_id
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());

    if input.action.targets_messages() && !has_channel {
        return Err(ValidationError::new("channel_required")
            .with_message("message actions require channel_id".into()));
    }

    if input.action == ModerationAction::TimeoutUser && input.timeout_duration.is_none() {
        return Err(ValidationError::new("timeout_required")
            .with_message("timeout_user requires timeout_duration".into()));
    }

    Ok(())
}
