// SPDX-License-Identifier: MIT

//! Sub-task nodes and their status state machine

use crate::adk::error::GraphError;
use crate::weave::context::MemoryTurn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single sub-task node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Success,
    Partial,
    Failed,
    Human,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Human => "human",
        }
    }

    /// `human`, `partial` and `failed` halt forward progress until resumed
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Human | Self::Partial | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `to`.
    ///
    /// `success -> pending` is deliberately absent: only [`SubTaskNode::reset`]
    /// with `force` may regress a successful node.
    pub fn can_transition_to(&self, to: NodeStatus) -> bool {
        use NodeStatus::*;
        match (self, to) {
            (Pending, Running) => true,
            (Running, Success | Partial | Failed | Human) => true,
            // cancelled before the invocation finished
            (Running, Pending) => true,
            (Partial | Failed | Human, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic, single-tool unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTaskNode {
    pub index: usize,
    /// Text as the user phrased it
    pub description: String,
    /// Planner-normalized task text
    pub rewritten_task: String,
    /// `None` marks an informational, non-actionable node
    pub tool_name: Option<String>,
    pub depends_on: Option<usize>,
    /// Argument of this node fed by the dependency's output (advisory)
    pub dependency_attribute: Option<String>,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub help_prompts: Vec<String>,
    /// Extra tools invoked when the planned task fanned out
    #[serde(default)]
    pub other_tools: Vec<String>,
    #[serde(default)]
    pub internal_memory: Vec<MemoryTurn>,
    #[serde(default)]
    pub is_orphan: bool,
    /// Planned node whose fan-out produced this orphan
    #[serde(default)]
    pub fan_out_parent: Option<usize>,
}

impl SubTaskNode {
    pub fn new(index: usize, description: impl Into<String>, rewritten_task: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            rewritten_task: rewritten_task.into(),
            tool_name: None,
            depends_on: None,
            dependency_attribute: None,
            status: NodeStatus::Pending,
            result: None,
            issues: Vec::new(),
            help_prompts: Vec::new(),
            other_tools: Vec::new(),
            internal_memory: Vec::new(),
            is_orphan: false,
            fan_out_parent: None,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    pub fn with_dependency(mut self, depends_on: usize, attribute: Option<String>) -> Self {
        self.depends_on = Some(depends_on);
        self.dependency_attribute = attribute;
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.tool_name.is_some()
    }

    /// Task text handed to the tool-selection step
    pub fn task(&self) -> &str {
        if self.rewritten_task.is_empty() {
            &self.description
        } else {
            &self.rewritten_task
        }
    }

    /// Move to `to`, enforcing the state machine
    pub fn transition(&mut self, to: NodeStatus) -> Result<(), GraphError> {
        if !self.status.can_transition_to(to) {
            return Err(GraphError::InvalidTransition {
                index: self.index,
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Put the node back to `pending` so it is dispatched again.
    ///
    /// Paused nodes keep their memory so the retry sees earlier turns.
    /// A successful node is only reset when `force` is set.
    pub fn reset(&mut self, force: bool) -> Result<(), GraphError> {
        match self.status {
            NodeStatus::Pending => Ok(()),
            NodeStatus::Success if force => {
                self.status = NodeStatus::Pending;
                Ok(())
            }
            _ => self.transition(NodeStatus::Pending),
        }
    }

    /// Latest help prompt, falling back to the latest issue
    pub fn attention_text(&self) -> Option<&str> {
        self.help_prompts
            .last()
            .or_else(|| self.issues.last())
            .map(String::as_str)
    }
}
