// SPDX-License-Identifier: MIT

//! Seams between the engine and the capabilities it drives

use crate::adk::error::Result;
use crate::adk::tool::ToolSpec;
use crate::weave::context::MemoryTurn;
use crate::weave::outcome::ToolOutcome;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Runs one tool call.
///
/// Tool-reported failures come back as `Ok` outcomes with a non-success
/// status; `Err` is reserved for faults (unknown tool, transport, crash) and
/// fails the node.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        tool_name: &str,
        arguments: Value,
        conversation: &[MemoryTurn],
    ) -> Result<ToolOutcome>;
}

/// Enumerates available tools
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn describe(&self) -> BTreeMap<String, ToolSpec>;

    /// Markdown rendering handed to the decomposition step
    async fn to_markdown(&self) -> String {
        self.describe()
            .await
            .values()
            .map(ToolSpec::to_markdown)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
