// SPDX-License-Identifier: MIT

//! The planner: decomposition, tool selection and conversational replies
//!
//! The engine only sees the [`Planner`] trait. [`ModelPlanner`] implements it
//! over any [`Model`](crate::adk::model::Model).

pub mod model_planner;
pub mod retry;

pub use model_planner::ModelPlanner;
pub use retry::RetryPolicy;

use crate::adk::error::Result;
use crate::adk::model::Usage;
use crate::adk::tool::ToolSpec;
use crate::weave::context::{ConversationContext, MemoryTurn};
use crate::weave::graph::SubTaskDescriptor;
use crate::weave::node::SubTaskNode;
use crate::weave::outcome::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether resume input continues the paused task or starts something new
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    NewDiscussion,
    Continuation,
}

#[async_trait]
pub trait Planner: Send + Sync {
    /// Split a free-form request into single-tool sub-tasks
    async fn decompose(
        &self,
        query: &str,
        tool_catalog_markdown: &str,
    ) -> Result<(Vec<SubTaskDescriptor>, Usage)>;

    /// Choose concrete calls for one node; more than one call is a fan-out
    async fn select_tools(
        &self,
        task: &str,
        eligible_tools: &[ToolSpec],
        memory: &[MemoryTurn],
    ) -> Result<(Vec<ToolCall>, Usage)>;

    async fn classify(
        &self,
        user_input: &str,
        recent_memory: &[MemoryTurn],
    ) -> Result<(Classification, Usage)>;

    /// Short user-facing message for a level that needs attention
    async fn summarize_interim(
        &self,
        level_nodes: &[SubTaskNode],
        context: &ConversationContext,
    ) -> Result<(String, Usage)>;

    /// Closing reply once the whole graph succeeded
    async fn respond(&self, memory: &[MemoryTurn], prompt: &str) -> Result<(String, Usage)>;
}
