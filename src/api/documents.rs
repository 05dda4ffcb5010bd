//! Document listing and upload.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;

use super::types::{DocumentListResponse, UploadResponse, UploadedDocument};
use super::{storage_error_response, AppState};
use crate::storage::{Artifact, ArtifactStore};

/// Multipart field carrying a document.
const FILE_FIELD: &str = "file";

/// List the reference set.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentListResponse>, (StatusCode, String)> {
    let documents = state
        .agent
        .store()
        .list()
        .await
        .map_err(storage_error_response)?;
    Ok(Json(DocumentListResponse { documents }))
}

/// Upload one or more documents as multipart `file` fields.
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    let mut uploaded = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, "File field has no file name".to_string()))?;
        let mime_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| (e.status(), e.body_text()))?;

        let doc = save_document(state.agent.store().as_ref(), &name, mime_type, data).await?;
        uploaded.push(doc);
    }

    if uploaded.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("No '{}' field in upload", FILE_FIELD),
        ));
    }

    Ok(Json(UploadResponse { uploaded }))
}

async fn save_document(
    store: &dyn ArtifactStore,
    name: &str,
    mime_type: Option<String>,
    data: Bytes,
) -> Result<UploadedDocument, (StatusCode, String)> {
    let mut artifact = Artifact::new(name, data);
    // Browsers send octet-stream for unknown types; the extension knows better.
    if let Some(mime_type) = mime_type.filter(|m| m != "application/octet-stream") {
        artifact = artifact.with_mime_type(mime_type);
    }
    store.save(&artifact).await.map_err(storage_error_response)?;
    tracing::info!("Uploaded document '{}' ({} bytes)", name, artifact.data.len());

    Ok(UploadedDocument {
        name: artifact.name,
        mime_type: artifact.mime_type,
        size: artifact.data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDefinition, DocumentAgent};
    use crate::llm::scripted::ScriptedLlm;
    use crate::storage::InMemoryStore;

    #[tokio::test]
    async fn save_document_infers_type_from_extension() {
        let store = InMemoryStore::new();
        let doc = save_document(
            &store,
            "lease_agreement_1.pdf",
            Some("application/octet-stream".to_string()),
            Bytes::from_static(b"%PDF-1.4"),
        )
        .await
        .unwrap();
        assert_eq!(doc.mime_type, "application/pdf");
        assert_eq!(doc.size, 8);
        assert!(store.load("lease_agreement_1.pdf").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_document_rejects_bad_names() {
        let store = InMemoryStore::new();
        let (status, _) = save_document(&store, "../escape.pdf", None, Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_returns_reference_set() {
        let store = Arc::new(
            InMemoryStore::with_artifacts([
                Artifact::new("b.txt", "two"),
                Artifact::new("a.txt", "one"),
            ])
            .await,
        );
        let agent = DocumentAgent::new(
            AgentDefinition::multi_document(),
            Arc::new(ScriptedLlm::new()),
            store,
        );
        let Json(body) = list_documents(State(Arc::new(AppState::new(agent))))
            .await
            .unwrap();
        let names: Vec<_> = body.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
