//! Tool registry
//!
//! Tools are registered once at startup; lookups afterwards are read-only.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::domain::{DiscordGateway, DomainError, Tool, ToolDescriptor};

use super::builtin::{
    GetChannelInfoTool, GetMessagesTool, ModerateContentTool, SearchMessagesTool, SendMessageTool,
};

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the five Discord tools backed by `gateway`
    pub fn with_builtin_tools(gateway: Arc<dyn DiscordGateway>) -> Result<Self, DomainError> {
        let mut registry = Self::new();
        registry.register(Arc::new(SendMessageTool::new(gateway.clone())))?;
        registry.register(Arc::new(GetMessagesTool::new(gateway.clone())))?;
        registry.register(Arc::new(GetChannelInfoTool::new(gateway.clone())))?;
        registry.register(Arc::new(SearchMessagesTool::new(gateway.clone())))?;
        registry.register(Arc::new(ModerateContentTool::new(gateway)))?;
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), DomainError> {
        let descriptor = tool.descriptor();

        if self.tools.contains_key(descriptor.name) {
            return Err(DomainError::conflict(format!(
                "Tool '{}' is already registered",
                descriptor.name
            )));
        }

        info!(
            tool = descriptor.name,
            required_scope = %descriptor.required_scope,
            "Registering tool"
        );
        self.tools.insert(descriptor.name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Descriptors sorted by tool name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::Scope;
    use crate::domain::tool::MockDiscordGateway;

    #[test]
    fn test_builtin_tools_and_scopes() {
        let registry = ToolRegistry::with_builtin_tools(Arc::new(MockDiscordGateway::new())).unwrap();
        assert_eq!(registry.len(), 5);

        let scopes: Vec<(&str, Scope)> = registry
            .descriptors()
            .into_iter()
            .map(|d| (d.name, d.required_scope))
            .collect();

        assert_eq!(
            scopes,
            vec![
                ("get_channel_info", Scope::ReadOnly),
                ("get_messages", Scope::ReadOnly),
                ("moderate_content", Scope::Moderate),
                ("search_messages", Scope::ReadOnly),
                ("send_message", Scope::ReadWrite),
            ]
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let gateway: Arc<dyn DiscordGateway> = Arc::new(MockDiscordGateway::new());
        let mut registry = ToolRegistry::with_builtin_tools(gateway.clone()).unwrap();

        let result = registry.register(Arc::new(SendMessageTool::new(gateway)));
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_unknown_lookup() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("send_message").is_none());
    }
}
