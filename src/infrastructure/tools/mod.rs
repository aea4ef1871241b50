//! Discord tools and the gated dispatcher that runs them

mod builtin;
mod dispatcher;
mod registry;

pub use builtin::{
    GetChannelInfoTool, GetMessagesTool, ModerateContentTool, SearchMessagesTool, SendMessageTool,
    GET_CHANNEL_INFO, GET_MESSAGES, MODERATE_CONTENT, SEARCH_MESSAGES, SEND_MESSAGE,
};
pub use dispatcher::{DispatchOutcome, ToolDispatcher};
pub use registry::ToolRegistry;
