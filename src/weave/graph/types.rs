// SPDX-License-Identifier: MIT

//! Sub-task descriptors as produced by decomposition or read from a plan file

use crate::adk::error::GraphError;
use crate::weave::node::SubTaskNode;
use serde::{Deserialize, Serialize};

/// Dependency marker of a descriptor.
///
/// Planners write `-1`, `"none"`, `null` or an index (sometimes quoted).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(untagged)]
pub enum DependsOn {
    /// No dependency (root node)
    #[default]
    None,
    /// Numeric index; negative means none
    Index(i64),
    /// Textual marker: `"none"` or a quoted index
    Label(String),
}

impl DependsOn {
    /// Resolve to the index of the prerequisite node, if any
    pub fn resolve(&self, node: usize) -> Result<Option<usize>, GraphError> {
        match self {
            DependsOn::None => Ok(None),
            DependsOn::Index(i) if *i < 0 => Ok(None),
            DependsOn::Index(i) => Ok(Some(*i as usize)),
            DependsOn::Label(label) => {
                let label = label.trim();
                if label.is_empty() || label.eq_ignore_ascii_case("none") {
                    return Ok(None);
                }
                match label.parse::<i64>() {
                    Ok(i) if i < 0 => Ok(None),
                    Ok(i) => Ok(Some(i as usize)),
                    Err(_) => Err(GraphError::InvalidDependency {
                        node,
                        value: label.to_string(),
                    }),
                }
            }
        }
    }
}

impl From<Option<usize>> for DependsOn {
    fn from(dep: Option<usize>) -> Self {
        match dep {
            Some(i) => DependsOn::Index(i as i64),
            None => DependsOn::None,
        }
    }
}

/// One sub-task as described by the planner
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SubTaskDescriptor {
    pub index: usize,
    /// Text as the user phrased it
    #[serde(alias = "sub_query")]
    pub description: String,
    /// Normalized task text
    #[serde(default, alias = "task")]
    pub rewritten_task: String,
    /// Empty or `"none"` for informational sub-tasks
    #[serde(default, alias = "tool")]
    pub tool_name: Option<String>,
    #[serde(default, alias = "dependent_on")]
    pub depends_on: DependsOn,
    #[serde(default, alias = "dependency_attr")]
    pub dependency_attribute: Option<String>,
}

impl SubTaskDescriptor {
    pub fn new(index: usize, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            index,
            rewritten_task: description.clone(),
            description,
            tool_name: None,
            depends_on: DependsOn::None,
            dependency_attribute: None,
        }
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    pub fn after(mut self, index: usize) -> Self {
        self.depends_on = DependsOn::Index(index as i64);
        self
    }

    /// Build the graph node for this descriptor
    pub fn to_node(&self) -> Result<SubTaskNode, GraphError> {
        let mut node = SubTaskNode::new(self.index, &self.description, &self.rewritten_task);
        node.tool_name = self
            .tool_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("none"))
            .map(str::to_string);
        node.depends_on = self.depends_on.resolve(self.index)?;
        node.dependency_attribute = self
            .dependency_attribute
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("none"))
            .map(str::to_string);
        Ok(node)
    }
}

/// A decomposition: the planner reply or a YAML/JSON plan file
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Plan {
    #[serde(default, alias = "sub_queries", alias = "nodes")]
    pub sub_tasks: Vec<SubTaskDescriptor>,
}
