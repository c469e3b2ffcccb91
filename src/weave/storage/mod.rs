// SPDX-License-Identifier: MIT

//! Persistence of run snapshots so a paused run can resume in another process

pub mod json;
pub mod memory;

pub use json::JsonFileStorage;
pub use memory::MemoryStorage;

use crate::adk::error::{GraphError, StorageError};
use crate::weave::context::ConversationContext;
use crate::weave::engine::PausePoint;
use crate::weave::graph::{DependencyGraph, GraphSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Graph state plus what a later resume needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub saved_at: DateTime<Utc>,
    pub graph: GraphSnapshot,
    #[serde(default)]
    pub paused: Option<PausePoint>,
    #[serde(default)]
    pub context: Option<ConversationContext>,
}

impl RunSnapshot {
    pub fn capture(
        graph: &DependencyGraph,
        paused: Option<PausePoint>,
        context: Option<&ConversationContext>,
    ) -> Self {
        Self {
            saved_at: Utc::now(),
            graph: graph.snapshot(),
            paused,
            context: context.cloned(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.graph.run_id
    }

    pub fn restore_graph(&self) -> Result<DependencyGraph, GraphError> {
        DependencyGraph::restore(self.graph.clone())
    }

    pub(crate) fn encode(&self) -> Result<String, StorageError> {
        serde_json::to_string_pretty(self).map_err(|e| StorageError::Corrupt {
            run_id: self.run_id().to_string(),
            reason: e.to_string(),
        })
    }

    pub(crate) fn decode(run_id: &str, raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
            run_id: run_id.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Load/save/delete contract of a snapshot store
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, run_id: &str, snapshot: &RunSnapshot) -> Result<(), StorageError>;

    /// `StorageError::NotFound` when nothing is stored under `run_id`
    async fn load(&self, run_id: &str) -> Result<RunSnapshot, StorageError>;

    /// Deleting a missing run is not an error
    async fn delete(&self, run_id: &str) -> Result<(), StorageError>;

    /// Stored run ids, sorted
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}
