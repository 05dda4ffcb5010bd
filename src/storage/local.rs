//! Artifact store backed by a local directory.
//!
//! Content lives at `{root}/{name}`; MIME type and metadata live in a
//! sidecar at `{root}/.meta/{name}.json`. Dot-prefixed paths are never listed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{mime_for_name, validate_name, Artifact, ArtifactInfo, ArtifactStore, StorageError};

const META_DIR: &str = ".meta";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn content_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn sidecar_path(&self, name: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{}.json", name))
    }

    fn read_sidecar(&self, name: &str) -> Result<Sidecar, StorageError> {
        let path = self.sidecar_path(name);
        if !path.exists() {
            return Ok(Sidecar::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents)
            .map_err(|e| StorageError::Metadata(format!("{}: {}", path.display(), e)))
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[async_trait]
impl ArtifactStore for LocalStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn list(&self) -> Result<Vec<ArtifactInfo>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut infos = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let sidecar = self.read_sidecar(&name)?;
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            infos.push(ArtifactInfo {
                mime_type: sidecar
                    .mime_type
                    .unwrap_or_else(|| mime_for_name(&name).to_string()),
                name,
                size,
                metadata: sidecar.metadata,
                updated_at: modified_at(entry.path()),
            });
        }

        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn load(&self, name: &str) -> Result<Option<Artifact>, StorageError> {
        validate_name(name)?;
        let path = self.content_path(name);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let sidecar = self.read_sidecar(name)?;

        Ok(Some(Artifact {
            name: name.to_string(),
            mime_type: sidecar
                .mime_type
                .unwrap_or_else(|| mime_for_name(name).to_string()),
            data: Bytes::from(data),
            metadata: sidecar.metadata,
            updated_at: modified_at(&path),
        }))
    }

    async fn save(&self, artifact: &Artifact) -> Result<(), StorageError> {
        validate_name(&artifact.name)?;

        let path = self.content_path(&artifact.name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &artifact.data).await?;

        let sidecar = Sidecar {
            mime_type: Some(artifact.mime_type.clone()),
            metadata: artifact.metadata.clone(),
        };
        let sidecar_path = self.sidecar_path(&artifact.name);
        if let Some(parent) = sidecar_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(&sidecar)
            .map_err(|e| StorageError::Metadata(e.to_string()))?;
        tokio::fs::write(&sidecar_path, contents).await?;

        tracing::debug!("Saved artifact {} to {}", artifact.name, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_list_load_round_trip_with_metadata() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .save(
                &Artifact::new("leases/lease_agreement_1.pdf", b"%PDF-1.4".to_vec())
                    .with_metadata("tenant", "Apex Logistics"),
            )
            .await
            .expect("save");

        let listed = store.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "leases/lease_agreement_1.pdf");
        assert_eq!(listed[0].mime_type, "application/pdf");
        assert_eq!(listed[0].size, 8);
        assert_eq!(
            listed[0].metadata.get("tenant").map(String::as_str),
            Some("Apex Logistics")
        );

        let loaded = store
            .load("leases/lease_agreement_1.pdf")
            .await
            .expect("load")
            .expect("exists");
        assert_eq!(&loaded.data[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn hidden_files_and_missing_root_are_ignored() {
        let dir = TempDir::new().unwrap();
        let missing = LocalStore::new(dir.path().join("absent"));
        assert!(missing.list().await.unwrap().is_empty());

        std::fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        std::fs::write(dir.path().join("plot-45.txt"), b"rent").unwrap();
        let store = LocalStore::new(dir.path());
        assert_eq!(store.names().await.unwrap(), vec!["plot-45.txt"]);
        assert!(store.load("plot-99.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn explicit_mime_type_survives_reload() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store
            .save(&Artifact::new("upload", b"hello".to_vec()).with_mime_type("text/plain"))
            .await
            .unwrap();
        let loaded = store.load("upload").await.unwrap().unwrap();
        assert_eq!(loaded.mime_type, "text/plain");
    }
}
