// SPDX-License-Identifier: MIT

//! Dispatch of a single node: tool selection, invocation, fan-out

use crate::adk::error::Result;
use crate::adk::tool::ToolSpec;
use crate::weave::context::MemoryTurn;
use crate::weave::invoker::ToolInvoker;
use crate::weave::node::{NodeStatus, SubTaskNode};
use crate::weave::outcome::{ToolCall, ToolOutcome};
use crate::weave::planner::Planner;
use crate::weave::rollup::aggregate_fan_out;
use crate::weave::usage::UsageCounters;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Owned inputs of one spawned dispatch
pub(crate) struct NodeJob {
    pub node: SubTaskNode,
    /// Catalog entry of the node's tool; empty when the tool is unknown
    pub tools: Vec<ToolSpec>,
    /// Shared conversation memory at dispatch time
    pub conversation: Vec<MemoryTurn>,
}

/// Collaborators and limits shared by the dispatches of a level
#[derive(Clone)]
pub(crate) struct DispatchEnv {
    pub planner: Arc<dyn Planner>,
    pub invoker: Arc<dyn ToolInvoker>,
    pub usage: Arc<UsageCounters>,
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
    pub cancel_on_failure: bool,
}

pub(crate) struct CallRecord {
    pub call: ToolCall,
    pub outcome: ToolOutcome,
}

pub(crate) enum NodeReport {
    /// Every selected call ran; the first call belongs to the node itself
    Completed {
        index: usize,
        memory: Vec<MemoryTurn>,
        calls: Vec<CallRecord>,
    },
    /// Planner or invoker error, or a panic; `memory` is `None` when lost
    Fault {
        index: usize,
        memory: Option<Vec<MemoryTurn>>,
        issue: String,
    },
    /// Stopped because a sibling failed
    Cancelled { index: usize },
}

impl NodeReport {
    pub fn index(&self) -> usize {
        match self {
            Self::Completed { index, .. } | Self::Fault { index, .. } | Self::Cancelled { index } => {
                *index
            }
        }
    }
}

impl DispatchEnv {
    fn signal_failure(&self) {
        if self.cancel_on_failure && !self.cancel.is_cancelled() {
            log::info!("Cancelling remaining nodes of the level");
            self.cancel.cancel();
        }
    }

    fn fault(&self, index: usize, mut memory: Vec<MemoryTurn>, issue: String) -> NodeReport {
        log::error!("Node {} failed: {}", index, issue);
        memory.push(MemoryTurn::error(&issue));
        self.signal_failure();
        NodeReport::Fault {
            index,
            memory: Some(memory),
            issue,
        }
    }
}

async fn with_timeout<F>(limit: Option<Duration>, invocation: F) -> Result<ToolOutcome>
where
    F: Future<Output = Result<ToolOutcome>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, invocation).await {
            Ok(result) => result,
            Err(_) => Ok(ToolOutcome::failed(format!(
                "invocation timed out after {:?}",
                limit
            ))),
        },
        None => invocation.await,
    }
}

/// Run one node to completion
pub(crate) async fn run_node(job: NodeJob, env: DispatchEnv) -> NodeReport {
    let index = job.node.index;
    let task = job.node.task().to_string();

    let mut memory = job.node.internal_memory.clone();
    if memory.is_empty() {
        memory.push(MemoryTurn::user(&task));
    }

    if job.tools.is_empty() {
        let name = job.node.tool_name.as_deref().unwrap_or("none");
        return env.fault(index, memory, format!("tool '{}' is not available", name));
    }

    let mut prompt = job.conversation;
    prompt.extend(memory.iter().cloned());

    let selection = tokio::select! {
        _ = env.cancel.cancelled() => return NodeReport::Cancelled { index },
        selection = env.planner.select_tools(&task, &job.tools, &prompt) => selection,
    };
    let calls = match selection {
        Ok((calls, usage)) => {
            env.usage.add(usage);
            calls
        }
        Err(e) => return env.fault(index, memory, format!("tool selection failed: {}", e)),
    };
    if calls.is_empty() {
        return env.fault(index, memory, "no tool call was selected".to_string());
    }
    if calls.len() > 1 {
        log::info!("Node {} fans out into {} calls", index, calls.len());
    }

    let mut records = Vec::with_capacity(calls.len());
    for call in calls {
        memory.push(
            MemoryTurn::assistant(format!("Calling {} with {}", call.name, call.arguments)),
        );

        let invocation = env
            .invoker
            .invoke(&call.name, call.arguments.clone(), &prompt);
        let result = tokio::select! {
            _ = env.cancel.cancelled() => return NodeReport::Cancelled { index },
            result = with_timeout(env.timeout, invocation) => result,
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => return env.fault(index, memory, format!("{} failed: {}", call.name, e)),
        };

        log::debug!("Node {} call {} -> {}", index, call.name, outcome.node_status());
        memory.push(MemoryTurn::tool(
            &call.name,
            outcome.response_text(),
            outcome.node_status(),
        ));
        records.push(CallRecord { call, outcome });
    }

    let statuses: Vec<NodeStatus> = records.iter().map(|r| r.outcome.node_status()).collect();
    if aggregate_fan_out(&statuses) == NodeStatus::Failed {
        env.signal_failure();
    }

    NodeReport::Completed {
        index,
        memory,
        calls: records,
    }
}
