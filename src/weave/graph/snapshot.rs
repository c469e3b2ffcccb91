// SPDX-License-Identifier: MIT

//! Serializable image of a dependency graph

use super::dependency::DependencyGraph;
use crate::adk::error::GraphError;
use crate::adk::model::Usage;
use crate::weave::node::SubTaskNode;
use crate::weave::rollup::RollupStatus;
use crate::weave::usage::UsageCounters;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub node: usize,
    pub depends_on: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub level: usize,
    pub status: RollupStatus,
}

/// Everything needed to rebuild a [`DependencyGraph`] in another process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub run_id: String,
    pub next_index: usize,
    pub nodes: Vec<SubTaskNode>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEdge>,
    #[serde(default)]
    pub level_status: Vec<LevelRecord>,
    #[serde(default)]
    pub graph_status: RollupStatus,
    #[serde(default)]
    pub usage: Usage,
}

impl DependencyGraph {
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            run_id: self.run_id().to_string(),
            next_index: self.next_index(),
            nodes: self.nodes().cloned().collect(),
            dependencies: self
                .edges()
                .into_iter()
                .map(|(node, depends_on)| DependencyEdge { node, depends_on })
                .collect(),
            level_status: self
                .level_statuses()
                .iter()
                .map(|(level, status)| LevelRecord {
                    level: *level,
                    status: *status,
                })
                .collect(),
            graph_status: self.graph_status(),
            usage: self.usage().snapshot(),
        }
    }

    pub fn restore(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let edges: Vec<(usize, usize)> = snapshot
            .dependencies
            .iter()
            .map(|e| (e.node, e.depends_on))
            .collect();
        Self::from_parts(
            snapshot.run_id,
            snapshot.nodes,
            &edges,
            snapshot
                .level_status
                .iter()
                .map(|r| (r.level, r.status))
                .collect(),
            snapshot.graph_status,
            UsageCounters::from_usage(snapshot.usage),
            snapshot.next_index,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weave::graph::SubTaskDescriptor;
    use crate::weave::node::NodeStatus;

    #[test]
    fn test_restore_preserves_graph() {
        let mut graph = DependencyGraph::build(&[
            SubTaskDescriptor::new(0, "find").tool("search"),
            SubTaskDescriptor::new(1, "add").tool("add").after(0),
            SubTaskDescriptor::new(2, "chat"),
        ])
        .unwrap();
        graph.add_orphan(0, "search_tv").unwrap();
        graph.node_mut(0).unwrap().status = NodeStatus::Success;
        graph.set_level_status(0, RollupStatus::Success);
        graph.update_graph_status();
        graph.usage().add(Usage::new(10, 4));

        let json = serde_json::to_string(&graph.snapshot()).unwrap();
        let restored = DependencyGraph::restore(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.run_id(), graph.run_id());
        assert_eq!(restored.compute_levels(true), graph.compute_levels(true));
        assert_eq!(restored.next_index(), 4);
        assert_eq!(restored.node(0).unwrap().status, NodeStatus::Success);
        assert!(restored.node(3).unwrap().is_orphan);
        assert_eq!(restored.level_status(0), Some(RollupStatus::Success));
        assert_eq!(restored.usage().snapshot().total_tokens, 14);
        assert_eq!(restored.snapshot(), graph.snapshot());
    }

    #[test]
    fn test_restore_rejects_dangling_edge() {
        let mut snapshot = DependencyGraph::build(&[SubTaskDescriptor::new(0, "a").tool("t")])
            .unwrap()
            .snapshot();
        snapshot.dependencies.push(DependencyEdge {
            node: 0,
            depends_on: 5,
        });
        assert!(matches!(
            DependencyGraph::restore(snapshot),
            Err(GraphError::UnknownDependency { .. })
        ));
    }
}
