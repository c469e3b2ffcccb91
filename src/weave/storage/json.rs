// SPDX-License-Identifier: MIT

use super::{RunSnapshot, Storage};
use crate::adk::error::StorageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One `<run_id>.json` file per run under a directory
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &str) -> Result<PathBuf, StorageError> {
        let valid = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid run id: {:?}", run_id),
            )));
        }
        Ok(self.dir.join(format!("{}.json", run_id)))
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn save(&self, run_id: &str, snapshot: &RunSnapshot) -> Result<(), StorageError> {
        let path = self.path_for(run_id)?;
        let body = snapshot.encode()?;

        tokio::fs::create_dir_all(&self.dir).await?;
        // write-then-rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        log::debug!("Saved run {} to {}", run_id, path.display());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<RunSnapshot, StorageError> {
        let path = self.path_for(run_id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(run_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        log::debug!("Loaded run {} from {}", run_id, path.display());
        RunSnapshot::decode(run_id, &raw)
    }

    async fn delete(&self, run_id: &str) -> Result<(), StorageError> {
        let path = self.path_for(run_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::debug!("Deleted run {}", run_id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weave::context::{ConversationContext, MemoryTurn};
    use crate::weave::engine::PausePoint;
    use crate::weave::graph::{DependencyGraph, SubTaskDescriptor};

    fn snapshot() -> RunSnapshot {
        let graph = DependencyGraph::build(&[
            SubTaskDescriptor::new(0, "find").tool("search"),
            SubTaskDescriptor::new(1, "add").tool("add").after(0),
        ])
        .unwrap();
        let mut ctx = ConversationContext::new();
        ctx.push(MemoryTurn::user("Find Alien and add it"));
        RunSnapshot::capture(&graph, Some(PausePoint { level: 1, node: 1 }), Some(&ctx))
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("runs"));
        let snap = snapshot();
        let run_id = snap.run_id().to_string();

        storage.save(&run_id, &snap).await.unwrap();
        assert!(dir.path().join("runs").join(format!("{}.json", run_id)).exists());
        assert_eq!(storage.list().await.unwrap(), vec![run_id.clone()]);

        let loaded = storage.load(&run_id).await.unwrap();
        assert_eq!(loaded, snap);

        storage.delete(&run_id).await.unwrap();
        storage.delete(&run_id).await.unwrap();
        assert!(matches!(
            storage.load(&run_id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let storage = JsonFileStorage::new(dir.path());

        assert!(matches!(
            storage.load("broken").await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_like_run_ids() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path());
        assert!(matches!(
            storage.load("../etc/passwd").await,
            Err(StorageError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nope"));
        assert!(storage.list().await.unwrap().is_empty());
    }
}
