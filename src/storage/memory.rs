//! In-memory artifact store (non-persistent).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{validate_name, Artifact, ArtifactInfo, ArtifactStore, StorageError};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    artifacts: Arc<RwLock<BTreeMap<String, Artifact>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given artifacts.
    pub async fn with_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let store = Self::new();
        {
            let mut map = store.artifacts.write().await;
            for artifact in artifacts {
                map.insert(artifact.name.clone(), artifact);
            }
        }
        store
    }

    pub async fn remove(&self, name: &str) -> Option<Artifact> {
        self.artifacts.write().await.remove(name)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn list(&self) -> Result<Vec<ArtifactInfo>, StorageError> {
        Ok(self
            .artifacts
            .read()
            .await
            .values()
            .map(Artifact::info)
            .collect())
    }

    async fn load(&self, name: &str) -> Result<Option<Artifact>, StorageError> {
        Ok(self.artifacts.read().await.get(name).cloned())
    }

    async fn save(&self, artifact: &Artifact) -> Result<(), StorageError> {
        validate_name(&artifact.name)?;
        let mut stored = artifact.clone();
        stored.updated_at = Some(Utc::now());
        self.artifacts
            .write()
            .await
            .insert(stored.name.clone(), stored);
        Ok(())
    }
}
