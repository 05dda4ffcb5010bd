//! Agent module - document question answering.
//!
//! Each user turn runs to completion:
//! 1. Save an attached file as an artifact, if any
//! 2. List the reference set from the artifact store
//! 3. Resolve which document the question refers to (multi variant)
//! 4. Dispatch the resulting [`AgentCommand`]s until a reply is produced

mod agent_loop;
mod command;
mod definition;
mod prompt;
mod resolver;
mod session;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use agent_loop::DocumentAgent;
pub use command::AgentCommand;
pub use definition::{AgentDefinition, AgentVariant};
pub use resolver::{DocumentResolver, Resolution, ResolveError};
pub use session::{PendingClarification, Session, SessionState};

use crate::llm::LlmError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("Invalid agent definition: {0}")]
    Definition(String),

    #[error("Message is empty")]
    EmptyMessage,
}

/// A file the user attached to a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

/// One user turn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserMessage {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl UserMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// What kind of reply a turn produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Saved,
    Answer,
    Clarification,
    NotFound,
    NoDocuments,
    Error,
}

/// The agent's response to a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub kind: ReplyKind,
    pub text: String,
    /// Document saved or used for the answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// Candidates offered in a clarification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl AgentReply {
    pub fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            document: None,
            candidates: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }
}
