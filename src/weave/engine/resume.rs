// SPDX-License-Identifier: MIT

use super::result::{ExecutionResult, PausePoint};
use super::ExecutionEngine;
use crate::adk::error::{GraphError, Result};
use crate::weave::context::{ConversationContext, MemoryTurn};
use crate::weave::graph::DependencyGraph;
use crate::weave::node::SubTaskNode;
use crate::weave::planner::Classification;

/// How a resume treats the user's input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeOptions {
    /// Override the engine's `classify_resume_input` setting
    pub classify: Option<bool>,
    /// Start the paused node over with the input as its task
    pub reset_node: bool,
}

impl ResumeOptions {
    pub fn reset() -> Self {
        Self {
            classify: None,
            reset_node: true,
        }
    }

    pub fn without_classification(mut self) -> Self {
        self.classify = Some(false);
        self
    }
}

/// Assistant turn restating what the paused node asked for
fn attention_summary(node: &SubTaskNode) -> String {
    match (node.help_prompts.last(), node.issues.last()) {
        (Some(help), _) => help.clone(),
        (None, Some(issue)) => format!("The task could not be completed: {}", issue),
        (None, None) => "The task needs more information to continue.".to_string(),
    }
}

impl ExecutionEngine {
    /// Continue a paused execution with the user's answer.
    ///
    /// The pause point is taken from `last_result`; levels before it are
    /// never re-run. Returns `Err(GraphError::NoPausedNode)` when there is
    /// nothing to resume.
    pub async fn resume(
        &self,
        graph: &mut DependencyGraph,
        user_input: &str,
        context: &mut ConversationContext,
        last_result: Option<&ExecutionResult>,
        options: ResumeOptions,
    ) -> Result<ExecutionResult> {
        let pause = last_result.and_then(|r| r.paused);
        self.resume_from_pause(graph, user_input, context, pause, options)
            .await
    }

    /// [`resume`](Self::resume) from a stored pause point, e.g. one loaded
    /// from a [`RunSnapshot`](crate::weave::storage::RunSnapshot)
    pub async fn resume_from_pause(
        &self,
        graph: &mut DependencyGraph,
        user_input: &str,
        context: &mut ConversationContext,
        pause: Option<PausePoint>,
        options: ResumeOptions,
    ) -> Result<ExecutionResult> {
        let pause = pause.ok_or(GraphError::NoPausedNode)?;
        let levels = graph.compute_levels(false);
        let level_nodes = levels
            .get(pause.level)
            .ok_or(GraphError::UnknownLevel(pause.level))?;
        if !level_nodes.contains(&pause.node) {
            return Err(GraphError::UnknownNode(pause.node).into());
        }

        let classify = options
            .classify
            .unwrap_or(self.settings.classify_resume_input);
        if classify {
            match self.planner.classify(user_input, context.recent(5)).await {
                Ok((Classification::NewDiscussion, usage)) => {
                    graph.usage().add(usage);
                    log::info!("Resume input for run {} starts a new discussion", graph.run_id());
                    let levels = self.report_levels(graph);
                    return Ok(ExecutionResult::new_discussion(graph, context, levels));
                }
                Ok((Classification::Continuation, usage)) => graph.usage().add(usage),
                Err(e) => {
                    log::error!("Classification failed: {}", e);
                    let levels = self.report_levels(graph);
                    return Ok(ExecutionResult::fault(graph, context, levels, &e).paused_at(graph, pause));
                }
            }
        }

        {
            let node = graph.node_mut(pause.node)?;
            let summary = attention_summary(node);
            if options.reset_node {
                node.internal_memory.clear();
                node.result = None;
                node.issues.clear();
                node.help_prompts.clear();
                let task = node.task().to_string();
                node.internal_memory.push(MemoryTurn::user(task));
                node.rewritten_task = user_input.to_string();
            }
            node.internal_memory.push(MemoryTurn::assistant(summary));
            node.internal_memory.push(MemoryTurn::user(user_input));
        }

        for index in level_nodes {
            let node = graph.node_mut(*index)?;
            if node.status.is_paused() {
                node.reset(false)?;
            }
        }

        log::info!(
            "Resuming run {} at level {} (node {})",
            graph.run_id(),
            pause.level,
            pause.node
        );
        Ok(self.execute(graph, context, pause.level).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attention_summary_prefers_help() {
        let mut node = SubTaskNode::new(0, "a", "a");
        assert_eq!(
            attention_summary(&node),
            "The task needs more information to continue."
        );
        node.issues.push("list not found".to_string());
        assert_eq!(
            attention_summary(&node),
            "The task could not be completed: list not found"
        );
        node.help_prompts.push("Which list?".to_string());
        assert_eq!(attention_summary(&node), "Which list?");
    }

    #[test]
    fn test_reset_options() {
        let options = ResumeOptions::reset().without_classification();
        assert!(options.reset_node);
        assert_eq!(options.classify, Some(false));
        assert_eq!(ResumeOptions::default().classify, None);
    }
}
