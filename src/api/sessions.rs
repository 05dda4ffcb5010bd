//! Conversation session endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use uuid::Uuid;

use super::types::{PostMessageRequest, SessionView};
use super::{agent_error_response, AppState, SharedSession};
use crate::agent::{AgentReply, Attachment, Session, UserMessage};

fn view(session: &Session) -> SessionView {
    SessionView {
        id: session.id,
        state: session.state(),
        pending: session.pending().cloned(),
        loaded_document: session.loaded_document().map(str::to_string),
        history_len: session.history().len(),
    }
}

async fn find(state: &AppState, id: Uuid) -> Result<SharedSession, (StatusCode, String)> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Session {} not found", id)))
}

fn user_message(req: PostMessageRequest) -> Result<UserMessage, (StatusCode, String)> {
    let mut message = UserMessage::text(req.text);
    if let Some(payload) = req.attachment {
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.data.as_bytes())
            .map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Attachment '{}' is not valid base64: {}", payload.name, e),
                )
            })?;
        message = message.with_attachment(Attachment {
            name: payload.name,
            mime_type: payload.mime_type,
            data: data.into(),
        });
    }
    Ok(message)
}

/// Start a new conversation.
pub async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let handle = state.sessions.create().await;
    let session = handle.lock().await;
    tracing::info!("Created session {}", session.id);
    Json(view(&session))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, (StatusCode, String)> {
    let handle = find(&state, id).await?;
    let session = handle.lock().await;
    Ok(Json(view(&session)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if state.sessions.remove(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Run one user turn. Turns of the same session are serialized.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<Json<AgentReply>, (StatusCode, String)> {
    let handle = find(&state, id).await?;
    let message = user_message(req)?;

    let mut session = handle.lock().await;
    let reply = state
        .agent
        .handle_turn(&mut session, message)
        .await
        .map_err(|e| {
            tracing::warn!(session = %id, "Turn failed: {}", e);
            agent_error_response(e)
        })?;

    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDefinition, DocumentAgent, ReplyKind, SessionState};
    use crate::api::types::AttachmentPayload;
    use crate::llm::scripted::ScriptedLlm;
    use crate::storage::{Artifact, ArtifactStore, InMemoryStore};

    async fn app(llm: ScriptedLlm) -> (Arc<AppState>, Arc<InMemoryStore>) {
        let store = Arc::new(
            InMemoryStore::with_artifacts([
                Artifact::new("Lease Agreement - Plot 12", "Plot 12 annual rent: $120,000")
                    .with_mime_type("text/plain"),
                Artifact::new("Lease Agreement - Plot 45", "Plot 45 annual rent: $95,000")
                    .with_mime_type("text/plain"),
            ])
            .await,
        );
        let agent = DocumentAgent::new(
            AgentDefinition::multi_document(),
            Arc::new(llm),
            store.clone(),
        );
        (Arc::new(AppState::new(agent)), store)
    }

    fn text(text: &str) -> Json<PostMessageRequest> {
        Json(PostMessageRequest {
            text: text.to_string(),
            attachment: None,
        })
    }

    #[tokio::test]
    async fn clarification_then_answer_over_http_handlers() {
        let llm = ScriptedLlm::new()
            .reply(r#"{"verdict": "multiple", "documents": ["Lease Agreement - Plot 12", "Lease Agreement - Plot 45"]}"#)
            .reply(r#"{"verdict": "single", "documents": ["Lease Agreement - Plot 45"]}"#)
            .reply("The annual rent for Plot 45 is $95,000.");
        let (state, _) = app(llm).await;
        let Json(created) = create_session(State(state.clone())).await;
        assert_eq!(created.state, SessionState::AwaitingQuery);

        let Json(reply) = post_message(State(state.clone()), Path(created.id), text("what is the rent?"))
            .await
            .unwrap();
        assert_eq!(reply.kind, ReplyKind::Clarification);

        let Json(view) = get_session(State(state.clone()), Path(created.id)).await.unwrap();
        assert_eq!(view.state, SessionState::Clarifying);
        assert_eq!(view.pending.unwrap().candidates.len(), 2);

        let Json(reply) = post_message(State(state.clone()), Path(created.id), text("plot 45"))
            .await
            .unwrap();
        assert_eq!(reply.kind, ReplyKind::Answer);
        assert_eq!(reply.document.as_deref(), Some("Lease Agreement - Plot 45"));

        let Json(view) = get_session(State(state), Path(created.id)).await.unwrap();
        assert_eq!(view.state, SessionState::Loaded);
        assert_eq!(view.loaded_document.as_deref(), Some("Lease Agreement - Plot 45"));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (state, _) = app(ScriptedLlm::new()).await;
        let (status, _) = post_message(State(state.clone()), Path(Uuid::new_v4()), text("hi"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            delete_session(State(state), Path(Uuid::new_v4())).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        let (state, _) = app(ScriptedLlm::new()).await;
        let Json(created) = create_session(State(state.clone())).await;
        let (status, _) = post_message(State(state), Path(created.id), text("  "))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn attachment_is_decoded_and_saved() {
        let (state, store) = app(ScriptedLlm::new()).await;
        let Json(created) = create_session(State(state.clone())).await;
        let req = PostMessageRequest {
            text: String::new(),
            attachment: Some(AttachmentPayload {
                name: "notes.txt".to_string(),
                mime_type: None,
                data: base64::engine::general_purpose::STANDARD.encode(b"Plot 7 rent"),
            }),
        };

        let Json(reply) = post_message(State(state), Path(created.id), Json(req))
            .await
            .unwrap();
        assert_eq!(reply.kind, ReplyKind::Saved);
        let saved = store.load("notes.txt").await.unwrap().unwrap();
        assert_eq!(&saved.data[..], b"Plot 7 rent");
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let (state, store) = app(ScriptedLlm::new()).await;
        let Json(created) = create_session(State(state.clone())).await;
        let req = PostMessageRequest {
            text: String::new(),
            attachment: Some(AttachmentPayload {
                name: "notes.txt".to_string(),
                mime_type: None,
                data: "not base64!".to_string(),
            }),
        };
        let (status, _) = post_message(State(state), Path(created.id), Json(req))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.load("notes.txt").await.unwrap().is_none());
    }
}
