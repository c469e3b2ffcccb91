// SPDX-License-Identifier: MIT

//! Status aggregation: calls into a node, nodes into a level, levels into a graph

use crate::weave::node::NodeStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rolled-up status of a level or of the whole graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RollupStatus {
    #[default]
    Pending,
    Success,
    Partial,
    Failed,
    Human,
}

impl From<NodeStatus> for RollupStatus {
    fn from(status: NodeStatus) -> Self {
        match status {
            NodeStatus::Pending | NodeStatus::Running => Self::Pending,
            NodeStatus::Success => Self::Success,
            NodeStatus::Partial => Self::Partial,
            NodeStatus::Failed => Self::Failed,
            NodeStatus::Human => Self::Human,
        }
    }
}

impl fmt::Display for RollupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Human => "human",
        };
        f.write_str(s)
    }
}

/// Fold the outcomes of one node's tool calls into the node status.
///
/// Uniform outcomes keep their status, mixed outcomes are `partial`.
/// A node that produced no call at all is `failed`.
pub fn aggregate_fan_out(statuses: &[NodeStatus]) -> NodeStatus {
    let Some(first) = statuses.first() else {
        return NodeStatus::Failed;
    };
    if statuses.iter().all(|s| s == first) {
        *first
    } else {
        NodeStatus::Partial
    }
}

/// Roll a level up from `(index, status)` pairs of its dispatched nodes.
///
/// `success` iff every node succeeded; otherwise the status of the
/// lowest-index non-success node, which is also returned as the node that
/// needs attention.
pub fn level_rollup(nodes: &[(usize, NodeStatus)]) -> (RollupStatus, Option<usize>) {
    let mut ordered: Vec<_> = nodes.to_vec();
    ordered.sort_by_key(|(index, _)| *index);

    match ordered.iter().find(|(_, s)| *s != NodeStatus::Success) {
        Some((index, status)) => (RollupStatus::from(*status), Some(*index)),
        None => (RollupStatus::Success, None),
    }
}

/// Roll the graph up from the statuses of the attempted levels.
///
/// Precedence: all success, then any failed, any human, any partial; anything
/// else is still pending.
pub fn graph_rollup<'a>(levels: impl IntoIterator<Item = &'a RollupStatus>) -> RollupStatus {
    let statuses: Vec<RollupStatus> = levels.into_iter().copied().collect();

    if statuses.iter().all(|s| *s == RollupStatus::Success) {
        RollupStatus::Success
    } else if statuses.contains(&RollupStatus::Failed) {
        RollupStatus::Failed
    } else if statuses.contains(&RollupStatus::Human) {
        RollupStatus::Human
    } else if statuses.contains(&RollupStatus::Partial) {
        RollupStatus::Partial
    } else {
        RollupStatus::Pending
    }
}
