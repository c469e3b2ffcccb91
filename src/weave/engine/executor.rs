// SPDX-License-Identifier: MIT

use super::dispatch::{self, DispatchEnv, NodeJob, NodeReport};
use super::result::{ExecutionResult, PausePoint};
use super::ExecutionEngine;
use crate::adk::error::{GraphError, Result, WeaveError};
use crate::adk::tool::ToolSpec;
use crate::weave::context::{ConversationContext, MemoryTurn};
use crate::weave::graph::DependencyGraph;
use crate::weave::node::{NodeStatus, SubTaskNode};
use crate::weave::outcome::ToolOutcome;
use crate::weave::rollup::{self, aggregate_fan_out, RollupStatus};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

impl ExecutionEngine {
    /// Execute the graph level by level, starting at `resume_from_level`.
    ///
    /// Never fails: engine-level faults come back as a `failed` result that
    /// still carries memory, nodes and error info.
    pub async fn execute(
        &self,
        graph: &mut DependencyGraph,
        context: &mut ConversationContext,
        resume_from_level: usize,
    ) -> ExecutionResult {
        match self.run_levels(graph, context, resume_from_level).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Execution of run {} failed: {}", graph.run_id(), e);
                graph.update_graph_status();
                let levels = self.report_levels(graph);
                ExecutionResult::fault(graph, context, levels, &e)
            }
        }
    }

    pub(crate) fn report_levels(&self, graph: &DependencyGraph) -> Vec<Vec<usize>> {
        graph.compute_levels(self.settings.include_non_actionable)
    }

    async fn run_levels(
        &self,
        graph: &mut DependencyGraph,
        context: &mut ConversationContext,
        resume_from_level: usize,
    ) -> Result<ExecutionResult> {
        let levels = graph.compute_levels(false);
        let catalog = self.catalog.describe().await;
        let mut pause = None;

        for (level, indices) in levels.iter().enumerate().skip(resume_from_level) {
            if graph.level_status(level) == Some(RollupStatus::Success) {
                log::debug!("Level {} already succeeded, skipping", level);
                continue;
            }

            let pending: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|i| {
                    graph
                        .node(*i)
                        .map(|n| n.status != NodeStatus::Success)
                        .unwrap_or(false)
                })
                .collect();
            log::info!(
                "Executing level {} of run {}: nodes {:?}",
                level,
                graph.run_id(),
                pending
            );

            let reports = self.dispatch_level(graph, context, &pending, &catalog).await?;
            let completed = apply_reports(graph, reports)?;
            let (status, attention) = rollup::level_rollup(&completed);
            graph.set_level_status(level, status);
            log::info!("Level {} finished with status {}", level, status);

            if status == RollupStatus::Success {
                for index in indices {
                    context.extend(graph.node(*index)?.internal_memory.iter().cloned());
                }
                continue;
            }

            if self.settings.add_human_failed_memory {
                for (index, node_status) in &completed {
                    if *node_status != NodeStatus::Success {
                        context.extend(graph.node(*index)?.internal_memory.iter().cloned());
                    }
                }
            }

            let node = attention.ok_or_else(|| {
                WeaveError::other(format!("level {} halted without a node to blame", level))
            })?;
            log::warn!(
                "Run {} paused at level {} on node {} ({})",
                graph.run_id(),
                level,
                node,
                status
            );
            pause = Some(PausePoint { level, node });
            break;
        }

        let graph_status = graph.update_graph_status();
        let levels = self.report_levels(graph);

        if let Some(pause) = pause {
            let interim = if self.settings.generate_interim_messages {
                match self.interim_message(graph, context, &levels[pause.level]).await {
                    Ok(message) => Some(message),
                    Err(e) => {
                        log::error!("Interim message failed: {}", e);
                        return Ok(ExecutionResult::fault(graph, context, levels, &e)
                            .paused_at(graph, pause));
                    }
                }
            } else {
                None
            };
            let mut result = ExecutionResult::from_graph(graph, context, graph_status.into(), levels)
                .paused_at(graph, pause);
            result.interim_message = interim;
            return Ok(result);
        }

        let mut final_response = None;
        if graph_status == RollupStatus::Success {
            if let Some(prompt) = &self.settings.final_prompt {
                let (reply, usage) = self.planner.respond(&context.memory, prompt).await?;
                graph.usage().add(usage);
                context.push(MemoryTurn::user(prompt));
                context.push(MemoryTurn::assistant(&reply));
                final_response = Some(reply);
            }
        }

        let mut result = ExecutionResult::from_graph(graph, context, graph_status.into(), levels);
        result.final_response = final_response;
        Ok(result)
    }

    async fn interim_message(
        &self,
        graph: &DependencyGraph,
        context: &mut ConversationContext,
        level: &[usize],
    ) -> Result<String> {
        let level_nodes: Vec<SubTaskNode> = level
            .iter()
            .map(|i| graph.node(*i).cloned())
            .collect::<std::result::Result<_, GraphError>>()?;
        let (message, usage) = self.planner.summarize_interim(&level_nodes, context).await?;
        graph.usage().add(usage);
        context.push(MemoryTurn::assistant(&message));
        context.interim_message = Some(message.clone());
        Ok(message)
    }

    /// Spawn every node of the level and wait for all of them
    async fn dispatch_level(
        &self,
        graph: &mut DependencyGraph,
        context: &ConversationContext,
        indices: &[usize],
        catalog: &BTreeMap<String, ToolSpec>,
    ) -> Result<Vec<NodeReport>> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let env = DispatchEnv {
            planner: self.planner.clone(),
            invoker: self.invoker.clone(),
            usage: graph.usage().clone(),
            timeout: self.settings.invocation_timeout(),
            cancel: CancellationToken::new(),
            cancel_on_failure: self.settings.cancel_on_failure,
        };

        let mut handles = Vec::with_capacity(indices.len());
        for &index in indices {
            graph.remove_orphans_of(index);

            let node = graph.node_mut(index)?;
            node.other_tools.clear();
            node.reset(false)?;
            node.transition(NodeStatus::Running)?;

            let tools: Vec<ToolSpec> = node
                .tool_name
                .as_ref()
                .and_then(|name| catalog.get(name))
                .cloned()
                .into_iter()
                .collect();
            let job = NodeJob {
                node: node.clone(),
                tools,
                conversation: context.memory.clone(),
            };

            log::debug!("Dispatching node {}", index);
            let env = env.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                dispatch::run_node(job, env).await
            });
            handles.push((index, handle));
        }

        let joined = join_all(
            handles
                .into_iter()
                .map(|(index, handle)| async move { (index, handle.await) }),
        )
        .await;

        Ok(joined
            .into_iter()
            .map(|(index, joined)| match joined {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Dispatch of node {} aborted: {}", index, e);
                    NodeReport::Fault {
                        index,
                        memory: None,
                        issue: format!("dispatch aborted: {}", e),
                    }
                }
            })
            .collect())
    }
}

fn record_diagnostics(node: &mut SubTaskNode, outcome: &ToolOutcome) {
    if let Some(issue) = &outcome.issue {
        node.issues.push(issue.clone());
    }
    if let Some(help) = &outcome.help {
        node.help_prompts.push(help.clone());
    }
}

fn payload_result(outcome: &ToolOutcome) -> Option<String> {
    if outcome.payload.is_null() {
        None
    } else {
        Some(outcome.payload_text())
    }
}

/// Write dispatch reports back onto the graph.
///
/// Returns `(index, status)` of every node that finished; cancelled nodes go
/// back to `pending` and are left out.
fn apply_reports(
    graph: &mut DependencyGraph,
    mut reports: Vec<NodeReport>,
) -> std::result::Result<Vec<(usize, NodeStatus)>, GraphError> {
    reports.sort_by_key(NodeReport::index);
    let mut completed = Vec::with_capacity(reports.len());

    for report in reports {
        match report {
            NodeReport::Cancelled { index } => {
                graph.node_mut(index)?.transition(NodeStatus::Pending)?;
                log::info!("Node {} was cancelled and stays pending", index);
            }
            NodeReport::Fault {
                index,
                memory,
                issue,
            } => {
                let node = graph.node_mut(index)?;
                if let Some(memory) = memory {
                    node.internal_memory = memory;
                }
                node.result = None;
                node.issues.push(issue);
                node.transition(NodeStatus::Failed)?;
                completed.push((index, NodeStatus::Failed));
            }
            NodeReport::Completed {
                index,
                memory,
                calls,
            } => {
                let statuses: Vec<NodeStatus> =
                    calls.iter().map(|c| c.outcome.node_status()).collect();
                let status = aggregate_fan_out(&statuses);

                let node = graph.node_mut(index)?;
                node.internal_memory = memory;
                node.result = calls.first().and_then(|c| payload_result(&c.outcome));
                node.other_tools = calls.iter().skip(1).map(|c| c.call.name.clone()).collect();
                for record in &calls {
                    record_diagnostics(node, &record.outcome);
                }
                node.transition(status)?;

                for record in calls.iter().skip(1) {
                    let orphan_index = graph.add_orphan(index, &record.call.name)?;
                    let orphan = graph.node_mut(orphan_index)?;
                    orphan.result = payload_result(&record.outcome);
                    record_diagnostics(orphan, &record.outcome);
                    orphan.transition(NodeStatus::Running)?;
                    orphan.transition(record.outcome.node_status())?;
                }

                log::info!("Node {} finished with status {}", index, status);
                completed.push((index, status));
            }
        }
    }

    Ok(completed)
}
