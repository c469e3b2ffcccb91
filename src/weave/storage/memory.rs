// SPDX-License-Identifier: MIT

use super::{RunSnapshot, Storage};
use crate::adk::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process store; snapshots are kept serialized so loads are real copies
#[derive(Clone, Default)]
pub struct MemoryStorage {
    runs: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, run_id: &str, snapshot: &RunSnapshot) -> Result<(), StorageError> {
        let body = snapshot.encode()?;
        self.runs.write().await.insert(run_id.to_string(), body);
        log::debug!("Saved run {} in memory", run_id);
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<RunSnapshot, StorageError> {
        let runs = self.runs.read().await;
        let raw = runs
            .get(run_id)
            .ok_or_else(|| StorageError::NotFound(run_id.to_string()))?;
        RunSnapshot::decode(run_id, raw)
    }

    async fn delete(&self, run_id: &str) -> Result<(), StorageError> {
        self.runs.write().await.remove(run_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = self.runs.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weave::graph::{DependencyGraph, SubTaskDescriptor};
    use crate::weave::node::NodeStatus;

    #[tokio::test]
    async fn test_round_trip_is_a_copy() {
        let storage = MemoryStorage::new();
        let mut graph =
            DependencyGraph::build(&[SubTaskDescriptor::new(0, "find").tool("search")]).unwrap();
        let run_id = graph.run_id().to_string();
        storage
            .save(&run_id, &RunSnapshot::capture(&graph, None, None))
            .await
            .unwrap();

        graph.node_mut(0).unwrap().status = NodeStatus::Failed;

        let loaded = storage.load(&run_id).await.unwrap().restore_graph().unwrap();
        assert_eq!(loaded.node(0).unwrap().status, NodeStatus::Pending);
        assert_eq!(loaded.compute_levels(false), vec![vec![0]]);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.load("nope").await,
            Err(StorageError::NotFound(_))
        ));

        storage
            .runs
            .write()
            .await
            .insert("bad".to_string(), "[]".to_string());
        assert!(matches!(
            storage.load("bad").await,
            Err(StorageError::Corrupt { .. })
        ));
    }
}
