//! Per-conversation state.
//!
//! A turn moves `AwaitingQuery → Resolving → {Loaded, Clarifying, NotFound}`.
//! `Clarifying` keeps the pending question until the follow-up arrives;
//! `Loaded` and `NotFound` fall back to `AwaitingQuery` when the next turn
//! starts.

use serde::Serialize;
use uuid::Uuid;

use super::AgentError;
use crate::llm::Content;

/// Resolution state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the next question
    AwaitingQuery,
    /// Matching the question against the reference set
    Resolving,
    /// A document was loaded and the question answered
    Loaded,
    /// Waiting for the user to pick among candidates
    Clarifying,
    /// No document matched the last question
    NotFound,
}

impl SessionState {
    fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (AwaitingQuery, Resolving)
                | (Resolving, Loaded)
                | (Resolving, Clarifying)
                | (Resolving, NotFound)
                | (Resolving, AwaitingQuery)
                | (Clarifying, AwaitingQuery)
                | (Loaded, AwaitingQuery)
                | (NotFound, AwaitingQuery)
        )
    }
}

/// A question waiting on a clarification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingClarification {
    pub question: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    state: SessionState,
    pending: Option<PendingClarification>,
    loaded_document: Option<String>,
    history: Vec<Content>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::AwaitingQuery,
            pending: None,
            loaded_document: None,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pending(&self) -> Option<&PendingClarification> {
        self.pending.as_ref()
    }

    /// Document attached to the most recent answer.
    pub fn loaded_document(&self) -> Option<&str> {
        self.loaded_document.as_deref()
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// The last `max_turns` exchanges of the history.
    pub fn recent_history(&self, max_turns: usize) -> &[Content] {
        let keep = max_turns.saturating_mul(2).min(self.history.len());
        &self.history[self.history.len() - keep..]
    }

    pub(crate) fn push_turn(&mut self, user: Content, model: Content) {
        self.history.push(user);
        self.history.push(model);
    }

    fn transition(&mut self, next: SessionState) -> Result<(), AgentError> {
        if !self.state.can_transition_to(next) {
            return Err(AgentError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(session = %self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
        Ok(())
    }

    /// Begin a turn: settle terminal states, then enter `Resolving`.
    ///
    /// Returns the clarification this turn answers, if any.
    pub(crate) fn begin_resolving(&mut self) -> Result<Option<PendingClarification>, AgentError> {
        if self.state != SessionState::AwaitingQuery {
            self.transition(SessionState::AwaitingQuery)?;
        }
        let pending = self.pending.take();
        self.transition(SessionState::Resolving)?;
        Ok(pending)
    }

    pub(crate) fn mark_loaded(&mut self, document: &str) -> Result<(), AgentError> {
        self.transition(SessionState::Loaded)?;
        self.loaded_document = Some(document.to_string());
        Ok(())
    }

    pub(crate) fn mark_clarifying(
        &mut self,
        question: &str,
        candidates: Vec<String>,
    ) -> Result<(), AgentError> {
        self.transition(SessionState::Clarifying)?;
        self.pending = Some(PendingClarification {
            question: question.to_string(),
            candidates,
        });
        Ok(())
    }

    pub(crate) fn mark_not_found(&mut self) -> Result<(), AgentError> {
        self.transition(SessionState::NotFound)
    }

    /// Abandon a failed turn. The clarification it was answering, if any,
    /// becomes pending again.
    pub(crate) fn abandon(&mut self, pending: Option<PendingClarification>) {
        if self.state != SessionState::Resolving {
            return;
        }
        match pending {
            Some(pending) => {
                self.state = SessionState::Clarifying;
                self.pending = Some(pending);
            }
            None => self.state = SessionState::AwaitingQuery,
        }
    }
}
