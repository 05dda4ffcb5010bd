//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{AgentVariant, PendingClarification, SessionState};
use crate::storage::ArtifactInfo;

/// Server health and wiring.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Agent definition name
    pub agent: String,
    pub variant: AgentVariant,
    pub model: String,
    /// Where documents are stored
    pub storage: String,
}

/// The reference set.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<ArtifactInfo>,
}

/// A document stored through the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedDocument {
    pub name: String,
    pub mime_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub uploaded: Vec<UploadedDocument>,
}

/// Snapshot of a conversation session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub state: SessionState,

    /// Question waiting on a clarification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingClarification>,

    /// Document the last answer was based on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_document: Option<String>,

    /// Number of recorded history entries
    pub history_len: usize,
}

/// A file attached to a message, base64 encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

/// Request to send a user turn.
#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
}
