// SPDX-License-Identifier: MIT

//! Conversation memory shared across levels and resume cycles

use crate::weave::node::NodeStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Error,
}

/// One conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
}

impl MemoryTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name: None,
            status: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_name: Some(name.into()),
            status: Some(status),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }
}

/// Caller-owned conversation state threaded through executions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default)]
    pub memory: Vec<MemoryTurn>,
    /// Free-form facts about the user (e.g. `name`), passed to the planner
    #[serde(default)]
    pub user_profile: HashMap<String, String>,
    /// Last interim message produced when execution paused
    #[serde(default)]
    pub interim_message: Option<String>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: MemoryTurn) {
        self.memory.push(turn);
    }

    pub fn extend(&mut self, turns: impl IntoIterator<Item = MemoryTurn>) {
        self.memory.extend(turns);
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[MemoryTurn] {
        let start = self.memory.len().saturating_sub(n);
        &self.memory[start..]
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_profile.get("name").map(String::as_str)
    }
}
