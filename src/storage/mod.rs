//! Artifact storage: the documents the agent can load.
//!
//! Backends share the [`ArtifactStore`] trait. Names are relative to the
//! store's root or prefix and use `/` as separator.

mod gcs;
mod local;
mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use gcs::GcsStore;
pub use local::LocalStore;
pub use memory::InMemoryStore;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("Corrupt artifact metadata: {0}")]
    Metadata(String),
}

/// A stored document with its content.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
    pub metadata: BTreeMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Artifact {
    /// New artifact with the MIME type guessed from the name.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        Self {
            mime_type: mime_for_name(&name).to_string(),
            name,
            data: data.into(),
            metadata: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.data.len() as u64,
            metadata: self.metadata.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry without content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub metadata: BTreeMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A document store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Where the store lives, for logs.
    fn describe(&self) -> String;

    /// All artifacts, sorted by name.
    async fn list(&self) -> Result<Vec<ArtifactInfo>, StorageError>;

    /// Load one artifact; `Ok(None)` when it does not exist.
    async fn load(&self, name: &str) -> Result<Option<Artifact>, StorageError>;

    /// Create or replace an artifact.
    async fn save(&self, artifact: &Artifact) -> Result<(), StorageError>;

    /// Sorted artifact names: the reference set the agent resolves against.
    async fn names(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.list().await?.into_iter().map(|a| a.name).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Shared store handle.
pub type SharedArtifactStore = Arc<dyn ArtifactStore>;

/// Build the store selected by configuration.
pub fn from_config(
    config: &StorageConfig,
    timeout: std::time::Duration,
) -> Result<SharedArtifactStore, StorageError> {
    Ok(match config {
        StorageConfig::Gcs {
            bucket,
            prefix,
            access_token,
        } => Arc::new(GcsStore::new(bucket, prefix, access_token, timeout)?),
        StorageConfig::Local { root } => Arc::new(LocalStore::new(root)),
    })
}

/// Reject names that are empty, absolute or escape the store root.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.trim().is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// MIME type from the file extension.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_name_rejects_escapes() {
        assert!(validate_name("lease_agreement_1.pdf").is_ok());
        assert!(validate_name("2024/plot-12.pdf").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("/etc/passwd").is_err());
        assert!(validate_name("../secret.pdf").is_err());
        assert!(validate_name("a//b.pdf").is_err());
        assert!(validate_name("a\\b.pdf").is_err());
    }

    #[test]
    fn mime_is_guessed_from_extension() {
        assert_eq!(mime_for_name("Lease.PDF"), "application/pdf");
        assert_eq!(mime_for_name("notes.md"), "text/plain");
        assert_eq!(mime_for_name("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn names_are_sorted() {
        let store = InMemoryStore::new();
        store.save(&Artifact::new("b.pdf", "b")).await.unwrap();
        store.save(&Artifact::new("a.pdf", "a")).await.unwrap();
        assert_eq!(store.names().await.unwrap(), vec!["a.pdf", "b.pdf"]);
    }
}
