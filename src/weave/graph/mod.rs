// SPDX-License-Identifier: MIT

//! Dependency graph: descriptors, leveling and snapshots

pub mod dependency;
pub mod snapshot;
pub mod types;

pub use dependency::DependencyGraph;
pub use snapshot::{DependencyEdge, GraphSnapshot, LevelRecord};
pub use types::{DependsOn, Plan, SubTaskDescriptor};
