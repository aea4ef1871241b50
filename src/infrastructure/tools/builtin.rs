//! Built-in Discord tools

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::api_key::Scope;
use crate::domain::tool::{
    parse_input, GetChannelInfoInput, GetMessagesInput, ModerateContentInput, SearchMessagesInput,
    SendMessageInput,
};
use crate::domain::{DiscordGateway, RequestedAction, Tool, ToolDescriptor, ToolError};

pub const SEND_MESSAGE: &str = "send_message";
pub const GET_MESSAGES: &str = "get_messages";
pub const GET_CHANNEL_INFO: &str = "get_channel_info";
pub const SEARCH_MESSAGES: &str = "search_messages";
pub const MODERATE_CONTENT: &str = "moderate_content";

fn channel_target(scope: Scope, guild_id: &str, channel_id: Option<&str>) -> RequestedAction {
    let action = RequestedAction::new(scope).in_guild(guild_id);
    match channel_id {
        Some(channel_id) => action.in_channel(channel_id),
        None => action,
    }
}

#[derive(Debug)]
pub struct SendMessageTool {
    gateway: Arc<dyn DiscordGateway>,
}

impl SendMessageTool {
    pub fn new(gateway: Arc<dyn DiscordGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: SEND_MESSAGE,
            description: "Send a message to a channel, optionally as a reply",
            required_scope: Scope::ReadWrite,
        }
    }

    fn target(&self, input: &Value) -> Result<RequestedAction, ToolError> {
        let input: SendMessageInput = parse_input(input)?;
        Ok(channel_target(
            Scope::ReadWrite,
            &input.guild_id,
            Some(&input.channel_id),
        ))
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: SendMessageInput = parse_input(&input)?;
        Ok(self.gateway.send_message(input).await?)
    }
}

#[derive(Debug)]
pub struct GetMessagesTool {
    gateway: Arc<dyn DiscordGateway>,
}

impl GetMessagesTool {
    pub fn new(gateway: Arc<dyn DiscordGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for GetMessagesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: GET_MESSAGES,
            description: "Fetch recent message history from a channel",
            required_scope: Scope::ReadOnly,
        }
    }

    fn target(&self, input: &Value) -> Result<RequestedAction, ToolError> {
        let input: GetMessagesInput = parse_input(input)?;
        Ok(channel_target(
            Scope::ReadOnly,
            &input.guild_id,
            Some(&input.channel_id),
        ))
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: GetMessagesInput = parse_input(&input)?;
        Ok(self.gateway.get_messages(input).await?)
    }
}

#[derive(Debug)]
pub struct GetChannelInfoTool {
    gateway: Arc<dyn DiscordGateway>,
}

impl GetChannelInfoTool {
    pub fn new(gateway: Arc<dyn DiscordGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for GetChannelInfoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: GET_CHANNEL_INFO,
            description: "Describe a channel: name, type, topic and permissions",
            required_scope: Scope::ReadOnly,
        }
    }

    fn target(&self, input: &Value) -> Result<RequestedAction, ToolError> {
        let input: GetChannelInfoInput = parse_input(input)?;
        Ok(channel_target(
            Scope::ReadOnly,
            &input.guild_id,
            Some(&input.channel_id),
        ))
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: GetChannelInfoInput = parse_input(&input)?;
        Ok(self.gateway.get_channel_info(input).await?)
    }
}

#[derive(Debug)]
pub struct SearchMessagesTool {
    gateway: Arc<dyn DiscordGateway>,
}

impl SearchMessagesTool {
    pub fn new(gateway: Arc<dyn DiscordGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for SearchMessagesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: SEARCH_MESSAGES,
            description: "Search messages in a guild by content, author or attachments",
            required_scope: Scope::ReadOnly,
        }
    }

    /// Without a channel the search spans the whole guild, so a
    /// channel-restricted key is refused.
    fn target(&self, input: &Value) -> Result<RequestedAction, ToolError> {
        let input: SearchMessagesInput = parse_input(input)?;
        Ok(channel_target(
            Scope::ReadOnly,
            &input.guild_id,
            input.channel_id.as_deref(),
        ))
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: SearchMessagesInput = parse_input(&input)?;
        Ok(self.gateway.search_messages(input).await?)
    }
}

#[derive(Debug)]
pub struct ModerateContentTool {
    gateway: Arc<dyn DiscordGateway>,
}

impl ModerateContentTool {
    pub fn new(gateway: Arc<dyn DiscordGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for ModerateContentTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: MODERATE_CONTENT,
            description: "Delete messages or kick, ban and time out members",
            required_scope: Scope::Moderate,
        }
    }

    fn target(&self, input: &Value) -> Result<RequestedAction, ToolError> {
        let input: ModerateContentInput = parse_input(input)?;
        Ok(channel_target(
            Scope::Moderate,
            &input.guild_id,
            input.channel_id.as_deref(),
        ))
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: ModerateContentInput = parse_input(&input)?;
        Ok(self.gateway.moderate(input).await?)
    }
}
