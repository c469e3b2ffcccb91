// SPDX-License-Identifier: MIT

use crate::adk::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Trait for capabilities that sub-task nodes are bound to.
///
/// `execute` returns the raw JSON the capability produced. The invoker decodes
/// it into a `ToolOutcome` once, so tools may either return a bare payload or
/// an object carrying `status`, `payload`/`return`, `message`, `help`, `issue`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// Serializable description of a tool: what the catalog hands to the planner
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self::new(tool.name(), tool.description(), tool.schema().clone())
    }

    /// Render as a markdown bullet block: name, description, one line per parameter
    pub fn to_markdown(&self) -> String {
        let mut out = format!("{}: {}\n", self.name, self.description);
        if let Some(params) = self.schema.get("properties").and_then(Value::as_object) {
            for (param, details) in params {
                let kind = details.get("type").and_then(Value::as_str).unwrap_or("");
                let desc = details
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if kind == "array" {
                    let item = details
                        .pointer("/items/type")
                        .and_then(Value::as_str)
                        .unwrap_or("str");
                    out.push_str(&format!("    - {} (List[{}]): {}\n", param, item, desc));
                } else {
                    out.push_str(&format!("    - {} ({}): {}\n", param, kind, desc));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_spec_markdown() {
        let spec = ToolSpec::new(
            "add_to_favorite",
            "Add movies to a list",
            json!({
                "type": "object",
                "properties": {
                    "list": {"type": "string", "description": "List name"},
                    "movies": {"type": "array", "items": {"type": "string"}, "description": "Titles"}
                }
            }),
        );

        let md = spec.to_markdown();
        assert!(md.starts_with("add_to_favorite: Add movies to a list\n"));
        assert!(md.contains("    - list (string): List name"));
        assert!(md.contains("    - movies (List[string]): Titles"));
    }

    #[test]
    fn test_tool_spec_default_schema() {
        let spec: ToolSpec = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(spec.schema["type"], "object");
        assert_eq!(spec.to_markdown(), "ping: \n");
    }
}
