// SPDX-License-Identifier: MIT

//! Dependency graph of sub-task nodes and its leveling

use super::types::SubTaskDescriptor;
use crate::adk::error::GraphError;
use crate::weave::node::SubTaskNode;
use crate::weave::rollup::{self, RollupStatus};
use crate::weave::usage::UsageCounters;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Nodes of one decomposed request plus everything execution records on them
#[derive(Debug)]
pub struct DependencyGraph {
    run_id: String,
    nodes: BTreeMap<usize, SubTaskNode>,
    /// node -> prerequisites
    dependency_map: BTreeMap<usize, BTreeSet<usize>>,
    /// prerequisite -> dependents
    reverse_dependency_map: BTreeMap<usize, BTreeSet<usize>>,
    level_status: BTreeMap<usize, RollupStatus>,
    graph_status: RollupStatus,
    usage: Arc<UsageCounters>,
    /// Next free index; indices are never reused
    next_index: usize,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::with_run_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            nodes: BTreeMap::new(),
            dependency_map: BTreeMap::new(),
            reverse_dependency_map: BTreeMap::new(),
            level_status: BTreeMap::new(),
            graph_status: RollupStatus::Pending,
            usage: Arc::new(UsageCounters::new()),
            next_index: 0,
        }
    }

    /// Build a graph from planner descriptors.
    ///
    /// Dependencies between tool-bound nodes become edges. A dependency on an
    /// informational node is dropped and the dependent becomes a root.
    pub fn build(descriptors: &[SubTaskDescriptor]) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        graph.load(descriptors)?;
        Ok(graph)
    }

    /// Replace the graph contents with `descriptors`, keeping the run id
    pub fn load(&mut self, descriptors: &[SubTaskDescriptor]) -> Result<(), GraphError> {
        self.reset();

        for descriptor in descriptors {
            if self.nodes.contains_key(&descriptor.index) {
                return Err(GraphError::DuplicateIndex(descriptor.index));
            }
            let node = descriptor.to_node()?;
            self.next_index = self.next_index.max(node.index + 1);
            self.nodes.insert(node.index, node);
        }

        let mut edges = Vec::new();
        for node in self.nodes.values() {
            let Some(dep) = node.depends_on else {
                continue;
            };
            if dep == node.index {
                return Err(GraphError::SelfDependency(node.index));
            }
            let Some(target) = self.nodes.get(&dep) else {
                return Err(GraphError::UnknownDependency {
                    node: node.index,
                    depends_on: dep,
                });
            };
            if !node.is_actionable() {
                continue;
            }
            if !target.is_actionable() {
                log::warn!(
                    "Node {} depends on informational node {}; scheduling it as a root",
                    node.index,
                    dep
                );
                continue;
            }
            edges.push((node.index, dep));
        }
        for (node, dep) in edges {
            self.add_edge(node, dep);
        }

        let placed: BTreeSet<usize> = self.compute_levels(false).into_iter().flatten().collect();
        let stuck: Vec<usize> = self
            .nodes
            .values()
            .filter(|n| Self::schedulable(n) && !placed.contains(&n.index))
            .map(|n| n.index)
            .collect();
        if !stuck.is_empty() {
            return Err(GraphError::CircularDependency(stuck));
        }

        log::debug!(
            "Built graph {} with {} nodes and {} edges",
            self.run_id,
            self.nodes.len(),
            self.dependency_map.values().map(BTreeSet::len).sum::<usize>()
        );
        Ok(())
    }

    fn add_edge(&mut self, node: usize, depends_on: usize) {
        self.dependency_map.entry(node).or_default().insert(depends_on);
        self.reverse_dependency_map
            .entry(depends_on)
            .or_default()
            .insert(node);
    }

    fn schedulable(node: &SubTaskNode) -> bool {
        node.is_actionable() && !node.is_orphan
    }

    /// Partition tool-bound, planned nodes into execution levels (Kahn's
    /// algorithm).
    ///
    /// A node sits in level k iff all of its prerequisites are in levels
    /// below k. Indices within a level are ascending. Orphans never appear;
    /// informational nodes form a trailing level only when requested.
    pub fn compute_levels(&self, include_non_actionable: bool) -> Vec<Vec<usize>> {
        let mut placed = BTreeSet::new();
        let mut levels = Vec::new();

        let mut frontier: Vec<usize> = self
            .nodes
            .values()
            .filter(|n| Self::schedulable(n) && !self.dependency_map.contains_key(&n.index))
            .map(|n| n.index)
            .collect();

        while !frontier.is_empty() {
            frontier.sort_unstable();
            frontier.dedup();
            placed.extend(frontier.iter().copied());

            let mut next = Vec::new();
            for index in &frontier {
                for child in self.dependents_of(*index) {
                    if placed.contains(&child) {
                        continue;
                    }
                    let ready = self
                        .dependency_map
                        .get(&child)
                        .map(|deps| deps.iter().all(|d| placed.contains(d)))
                        .unwrap_or(true);
                    if ready {
                        next.push(child);
                    }
                }
            }
            levels.push(std::mem::take(&mut frontier));
            frontier = next;
        }

        if include_non_actionable {
            let informational: Vec<usize> = self
                .nodes
                .values()
                .filter(|n| !n.is_actionable() && !n.is_orphan)
                .map(|n| n.index)
                .collect();
            if !informational.is_empty() {
                levels.push(informational);
            }
        }

        levels
    }

    /// Level holding `index`, if it is a scheduled node
    pub fn level_of(&self, index: usize) -> Option<usize> {
        self.compute_levels(false)
            .iter()
            .position(|level| level.contains(&index))
    }

    pub fn dependencies_of(&self, index: usize) -> Vec<usize> {
        self.dependency_map
            .get(&index)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn dependents_of(&self, index: usize) -> Vec<usize> {
        self.reverse_dependency_map
            .get(&index)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Reserve a fresh node index
    pub fn allocate_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Record an extra tool call of `parent` as an orphan node.
    ///
    /// Orphans inherit the parent's texts, never enter the dependency maps
    /// and are excluded from leveling.
    pub fn add_orphan(&mut self, parent: usize, tool_name: &str) -> Result<usize, GraphError> {
        let (description, task) = {
            let node = self.node(parent)?;
            (node.description.clone(), node.rewritten_task.clone())
        };
        let index = self.allocate_index();
        let mut orphan = SubTaskNode::new(index, description, task).with_tool(tool_name);
        orphan.is_orphan = true;
        orphan.fan_out_parent = Some(parent);
        self.nodes.insert(index, orphan);
        Ok(index)
    }

    /// Drop orphans created by earlier dispatches of `parent`
    pub fn remove_orphans_of(&mut self, parent: usize) -> Vec<usize> {
        let removed: Vec<usize> = self
            .nodes
            .values()
            .filter(|n| n.is_orphan && n.fan_out_parent == Some(parent))
            .map(|n| n.index)
            .collect();
        for index in &removed {
            self.nodes.remove(index);
        }
        removed
    }

    pub fn orphans_of(&self, parent: usize) -> Vec<&SubTaskNode> {
        self.nodes
            .values()
            .filter(|n| n.is_orphan && n.fan_out_parent == Some(parent))
            .collect()
    }

    pub fn non_actionable(&self) -> Vec<&SubTaskNode> {
        self.nodes
            .values()
            .filter(|n| !n.is_actionable() && !n.is_orphan)
            .collect()
    }

    pub fn node(&self, index: usize) -> Result<&SubTaskNode, GraphError> {
        self.nodes.get(&index).ok_or(GraphError::UnknownNode(index))
    }

    pub fn node_mut(&mut self, index: usize) -> Result<&mut SubTaskNode, GraphError> {
        self.nodes
            .get_mut(&index)
            .ok_or(GraphError::UnknownNode(index))
    }

    pub fn contains(&self, index: usize) -> bool {
        self.nodes.contains_key(&index)
    }

    /// All nodes, orphans included, by ascending index
    pub fn nodes(&self) -> impl Iterator<Item = &SubTaskNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn usage(&self) -> &Arc<UsageCounters> {
        &self.usage
    }

    pub fn level_status(&self, level: usize) -> Option<RollupStatus> {
        self.level_status.get(&level).copied()
    }

    pub fn level_statuses(&self) -> &BTreeMap<usize, RollupStatus> {
        &self.level_status
    }

    pub fn set_level_status(&mut self, level: usize, status: RollupStatus) {
        self.level_status.insert(level, status);
    }

    pub fn graph_status(&self) -> RollupStatus {
        self.graph_status
    }

    /// Recompute the graph status from the attempted levels
    pub fn update_graph_status(&mut self) -> RollupStatus {
        self.graph_status = rollup::graph_rollup(self.level_status.values());
        self.graph_status
    }

    /// Clear nodes, edges, statuses and usage; the run id survives
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.dependency_map.clear();
        self.reverse_dependency_map.clear();
        self.level_status.clear();
        self.graph_status = RollupStatus::Pending;
        self.usage.clear();
        self.next_index = 0;
    }

    pub(crate) fn from_parts(
        run_id: String,
        nodes: Vec<SubTaskNode>,
        edges: &[(usize, usize)],
        level_status: BTreeMap<usize, RollupStatus>,
        graph_status: RollupStatus,
        usage: UsageCounters,
        next_index: usize,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::with_run_id(run_id);
        for node in nodes {
            let index = node.index;
            if graph.nodes.insert(index, node).is_some() {
                return Err(GraphError::DuplicateIndex(index));
            }
        }
        for (node, dep) in edges {
            if !graph.nodes.contains_key(node) {
                return Err(GraphError::UnknownNode(*node));
            }
            if !graph.nodes.contains_key(dep) {
                return Err(GraphError::UnknownDependency {
                    node: *node,
                    depends_on: *dep,
                });
            }
            graph.add_edge(*node, *dep);
        }
        let max_seen = graph.nodes.keys().last().map(|i| i + 1).unwrap_or(0);
        graph.next_index = next_index.max(max_seen);
        graph.level_status = level_status;
        graph.graph_status = graph_status;
        graph.usage = Arc::new(usage);
        Ok(graph)
    }

    pub(crate) fn edges(&self) -> Vec<(usize, usize)> {
        self.dependency_map
            .iter()
            .flat_map(|(node, deps)| deps.iter().map(move |dep| (*node, *dep)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(index: usize, tool: Option<&str>, dep: Option<usize>) -> SubTaskDescriptor {
        let mut desc = SubTaskDescriptor::new(index, format!("task {}", index));
        if let Some(t) = tool {
            desc = desc.tool(t);
        }
        if let Some(dep) = dep {
            desc = desc.after(dep);
        }
        desc
    }

    #[test]
    fn test_levels_follow_dependencies() {
        let graph = DependencyGraph::build(&[
            d(0, Some("search"), None),
            d(1, Some("search"), None),
            d(2, Some("create"), Some(0)),
            d(3, Some("add"), Some(2)),
            d(4, Some("add"), Some(1)),
        ])
        .unwrap();

        assert_eq!(graph.compute_levels(false), vec![vec![0, 1], vec![2, 4], vec![3]]);
        assert_eq!(graph.level_of(3), Some(2));
        assert_eq!(graph.dependents_of(0), vec![2]);
    }

    #[test]
    fn test_informational_dependency_is_dropped() {
        let graph = DependencyGraph::build(&[
            d(0, None, None),
            d(1, Some("search"), Some(0)),
        ])
        .unwrap();

        assert_eq!(graph.compute_levels(false), vec![vec![1]]);
        assert_eq!(graph.compute_levels(true), vec![vec![1], vec![0]]);
        assert!(graph.dependencies_of(1).is_empty());
        assert_eq!(graph.non_actionable().len(), 1);
    }

    #[test]
    fn test_build_errors() {
        assert_eq!(
            DependencyGraph::build(&[d(0, Some("a"), None), d(0, Some("b"), None)]).unwrap_err(),
            GraphError::DuplicateIndex(0)
        );
        assert_eq!(
            DependencyGraph::build(&[d(0, Some("a"), Some(9))]).unwrap_err(),
            GraphError::UnknownDependency {
                node: 0,
                depends_on: 9
            }
        );
        assert_eq!(
            DependencyGraph::build(&[d(1, Some("a"), Some(1))]).unwrap_err(),
            GraphError::SelfDependency(1)
        );
        assert_eq!(
            DependencyGraph::build(&[
                d(0, Some("a"), Some(1)),
                d(1, Some("b"), Some(0)),
                d(2, Some("c"), None),
            ])
            .unwrap_err(),
            GraphError::CircularDependency(vec![0, 1])
        );
    }

    #[test]
    fn test_orphans_are_never_leveled() {
        let mut graph =
            DependencyGraph::build(&[d(0, Some("search"), None), d(1, Some("add"), Some(0))])
                .unwrap();
        let orphan = graph.add_orphan(0, "search_tv").unwrap();

        assert_eq!(orphan, 2);
        assert_eq!(graph.compute_levels(true), vec![vec![0], vec![1]]);
        assert_eq!(graph.orphans_of(0).len(), 1);
        assert_eq!(graph.node(orphan).unwrap().fan_out_parent, Some(0));

        assert_eq!(graph.remove_orphans_of(0), vec![2]);
        // indices are not reused
        assert_eq!(graph.allocate_index(), 3);
    }

    #[test]
    fn test_reset_keeps_run_id() {
        let mut graph = DependencyGraph::build(&[d(0, Some("a"), None)]).unwrap();
        let run_id = graph.run_id().to_string();
        graph.set_level_status(0, RollupStatus::Failed);
        graph.update_graph_status();
        graph.reset();

        assert!(graph.is_empty());
        assert_eq!(graph.run_id(), run_id);
        assert_eq!(graph.graph_status(), RollupStatus::Pending);
        assert_eq!(graph.next_index(), 0);
    }

    #[test]
    fn test_graph_status_over_attempted_levels() {
        let mut graph = DependencyGraph::build(&[d(0, Some("a"), None)]).unwrap();
        assert_eq!(graph.update_graph_status(), RollupStatus::Success);
        graph.set_level_status(0, RollupStatus::Success);
        graph.set_level_status(1, RollupStatus::Human);
        assert_eq!(graph.update_graph_status(), RollupStatus::Human);
    }
}
