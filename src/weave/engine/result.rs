// SPDX-License-Identifier: MIT

use crate::adk::error::WeaveError;
use crate::adk::model::Usage;
use crate::weave::context::{ConversationContext, MemoryTurn};
use crate::weave::graph::DependencyGraph;
use crate::weave::node::SubTaskNode;
use crate::weave::rollup::RollupStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of one `execute`/`resume` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Partial,
    Human,
    Pending,
    /// Resume input started a new topic; the graph was left untouched
    NewDiscussion,
}

impl From<RollupStatus> for ExecutionStatus {
    fn from(status: RollupStatus) -> Self {
        match status {
            RollupStatus::Success => Self::Success,
            RollupStatus::Failed => Self::Failed,
            RollupStatus::Partial => Self::Partial,
            RollupStatus::Human => Self::Human,
            RollupStatus::Pending => Self::Pending,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Partial => "partial",
            Self::Human => "human",
            Self::Pending => "pending",
            Self::NewDiscussion => "new_discussion",
        };
        f.write_str(s)
    }
}

/// Where execution halted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausePoint {
    pub level: usize,
    /// Lowest-index non-success node of that level
    pub node: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&WeaveError> for ErrorInfo {
    fn from(err: &WeaveError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: String,
    pub status: ExecutionStatus,
    pub message: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub interim_message: Option<String>,
    #[serde(default)]
    pub final_response: Option<String>,
    #[serde(default)]
    pub paused: Option<PausePoint>,
    #[serde(default)]
    pub levels: Vec<Vec<usize>>,
    #[serde(default)]
    pub memory: Vec<MemoryTurn>,
    #[serde(default)]
    pub nodes: Vec<SubTaskNode>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub error_info: Option<ErrorInfo>,
}

impl ExecutionResult {
    pub(crate) fn from_graph(
        graph: &DependencyGraph,
        context: &ConversationContext,
        status: ExecutionStatus,
        levels: Vec<Vec<usize>>,
    ) -> Self {
        Self {
            run_id: graph.run_id().to_string(),
            status,
            message: default_message(status).to_string(),
            help: None,
            issue: None,
            interim_message: None,
            final_response: None,
            paused: None,
            levels,
            memory: context.memory.clone(),
            nodes: graph.nodes().cloned().collect(),
            usage: graph.usage().snapshot(),
            error_info: None,
        }
    }

    /// Attach the pause point and the paused node's help/issue text
    pub(crate) fn paused_at(mut self, graph: &DependencyGraph, pause: PausePoint) -> Self {
        if let Ok(node) = graph.node(pause.node) {
            self.help = node.help_prompts.last().cloned();
            self.issue = node.issues.last().cloned();
        }
        self.paused = Some(pause);
        self
    }

    /// Engine-level fault: failed, but still carrying memory and nodes
    pub(crate) fn fault(
        graph: &DependencyGraph,
        context: &ConversationContext,
        levels: Vec<Vec<usize>>,
        err: &WeaveError,
    ) -> Self {
        let mut result = Self::from_graph(graph, context, ExecutionStatus::Failed, levels);
        result.message = format!("Execution failed: {}", err);
        result.error_info = Some(ErrorInfo::from(err));
        result
    }

    pub(crate) fn new_discussion(
        graph: &DependencyGraph,
        context: &ConversationContext,
        levels: Vec<Vec<usize>>,
    ) -> Self {
        Self::from_graph(graph, context, ExecutionStatus::NewDiscussion, levels)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    /// Text to show the user: interim message, else help, else issue
    pub fn attention_text(&self) -> Option<&str> {
        self.interim_message
            .as_deref()
            .or(self.help.as_deref())
            .or(self.issue.as_deref())
    }
}

fn default_message(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Success => "All tasks completed successfully.",
        ExecutionStatus::Failed => "Execution stopped: a task failed.",
        ExecutionStatus::Partial => "Execution stopped: a task only partially succeeded.",
        ExecutionStatus::Human => "Execution paused: user input is needed.",
        ExecutionStatus::Pending => "Execution has not completed.",
        ExecutionStatus::NewDiscussion => {
            "User started a new discussion. Execution not resumed."
        }
    }
}
