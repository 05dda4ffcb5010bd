//! HTTP API for the document agent.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check and agent wiring
//! - `GET /api/documents` - List the reference set
//! - `POST /api/documents` - Upload documents (multipart, field `file`)
//! - `POST /api/sessions` - Start a conversation
//! - `GET /api/sessions/:id` - Session state
//! - `DELETE /api/sessions/:id` - End a conversation
//! - `POST /api/sessions/:id/messages` - Send a user turn

mod documents;
mod session_store;
mod sessions;
pub mod types;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use session_store::{InMemorySessionStore, SharedSession};

use crate::agent::{AgentDefinition, AgentError, DocumentAgent};
use crate::config::Config;
use crate::storage::StorageError;
use types::HealthResponse;

/// Upload limit for documents and attachments.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub agent: DocumentAgent,
    pub sessions: InMemorySessionStore,
}

impl AppState {
    pub fn new(agent: DocumentAgent) -> Self {
        Self {
            agent,
            sessions: InMemorySessionStore::new(),
        }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/documents",
            get(documents::list_documents).post(documents::upload_documents),
        )
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/sessions/:id/messages", post(sessions::post_message))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let definition = AgentDefinition::from_config(&config, None, None)?;
    let agent = DocumentAgent::from_config(&config, definition)?;
    info!(
        "Agent '{}' ({:?}) on {} with documents from {}",
        agent.definition().name,
        agent.definition().variant,
        agent.definition().model,
        agent.store().describe()
    );

    let app = router(Arc::new(AppState::new(agent)));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let definition = state.agent.definition();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        agent: definition.name.clone(),
        variant: definition.variant,
        model: definition.model.clone(),
        storage: state.agent.store().describe(),
    })
}

fn storage_error_response(err: StorageError) -> (StatusCode, String) {
    let status = match &err {
        StorageError::InvalidName(_) => StatusCode::BAD_REQUEST,
        StorageError::Http(_) | StorageError::Api { .. } => StatusCode::BAD_GATEWAY,
        StorageError::Io(_) | StorageError::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn agent_error_response(err: AgentError) -> (StatusCode, String) {
    match err {
        AgentError::Storage(e) => storage_error_response(e),
        AgentError::EmptyMessage => (StatusCode::BAD_REQUEST, err.to_string()),
        AgentError::Llm(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        AgentError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        AgentError::Definition(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
