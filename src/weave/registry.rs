// SPDX-License-Identifier: MIT

use crate::adk::error::{Result, WeaveError};
use crate::adk::tool::{Tool, ToolSpec};
use crate::weave::context::MemoryTurn;
use crate::weave::invoker::{ToolCatalog, ToolInvoker};
use crate::weave::outcome::ToolOutcome;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Name-keyed set of tools; serves as both catalog and invoker
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn register_all(&self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        let mut guard = self.tools.write().await;
        for tool in tools {
            guard.insert(tool.name().to_string(), tool);
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolCatalog for ToolRegistry {
    async fn describe(&self) -> BTreeMap<String, ToolSpec> {
        let tools = self.tools.read().await;
        tools
            .iter()
            .map(|(name, tool)| (name.clone(), ToolSpec::from_tool(tool.as_ref())))
            .collect()
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(
        &self,
        tool_name: &str,
        arguments: Value,
        _conversation: &[MemoryTurn],
    ) -> Result<ToolOutcome> {
        let tool = self
            .get(tool_name)
            .await
            .ok_or_else(|| WeaveError::tool_not_found(tool_name))?;

        log::debug!("Invoking tool {} with {}", tool_name, arguments);
        let raw = tool.execute(arguments).await?;
        Ok(ToolOutcome::from_value(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weave::outcome::OutcomeStatus;
    use serde_json::json;

    use once_cell::sync::Lazy;

    static MOCK_SCHEMA: Lazy<Value> = Lazy::new(|| {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look for"}
            }
        })
    });

    /// A mock tool that echoes a canned reply
    struct MockTool {
        name: String,
        description: String,
        reply: Value,
    }

    impl MockTool {
        fn new(name: &str, reply: Value) -> Self {
            Self {
                name: name.to_string(),
                description: format!("Mock tool: {}", name),
                reply,
            }
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            &self.description
        }

        fn schema(&self) -> &Value {
            &MOCK_SCHEMA
        }

        async fn execute(&self, _input: Value) -> Result<Value> {
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_register_and_get_tool() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(MockTool::new("test_tool", json!({}))))
            .await;

        let retrieved = registry.get("test_tool").await;
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "test_tool");
        assert!(registry.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = ToolRegistry::new();
        let cloned = registry.clone();
        cloned
            .register(Arc::new(MockTool::new("tool2", json!({}))))
            .await;

        assert!(registry.get("tool2").await.is_some());
    }

    #[tokio::test]
    async fn test_describe_is_sorted_and_renders_markdown() {
        let registry = ToolRegistry::new();
        registry
            .register_all([
                Arc::new(MockTool::new("zeta", json!({}))) as Arc<dyn Tool>,
                Arc::new(MockTool::new("alpha", json!({}))),
            ])
            .await;

        let specs = registry.describe().await;
        assert_eq!(specs.keys().collect::<Vec<_>>(), vec!["alpha", "zeta"]);

        let markdown = registry.to_markdown().await;
        assert!(markdown.starts_with("alpha: Mock tool: alpha\n"));
        assert!(markdown.contains("    - query (string): What to look for"));
    }

    #[tokio::test]
    async fn test_invoke_decodes_outcome() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(MockTool::new(
                "ask",
                json!({"status": "human", "message": "Which one?"}),
            )))
            .await;

        let outcome = registry.invoke("ask", json!({}), &[]).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Human);
        assert_eq!(outcome.help.as_deref(), Some("Which one?"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool_is_fault() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("missing", json!({}), &[]).await.unwrap_err();
        assert!(matches!(err, WeaveError::ToolNotFound { .. }));
    }
}
