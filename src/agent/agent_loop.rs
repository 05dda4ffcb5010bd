//! Core agent turn loop.

use std::sync::Arc;

use crate::config::Config;
use crate::llm::{Content, GeminiClient, GenerateRequest, GenerationConfig, LlmClient, Part};
use crate::storage::{self, Artifact, SharedArtifactStore};

use super::command::AgentCommand;
use super::definition::{AgentDefinition, AgentVariant};
use super::prompt::{
    available_documents, clarification_message, follow_up_query,
    missing_artifact_message, not_found_message, resolution_failed_message, saved_message,
    single_document_choice_message, unreadable_artifact_message, NO_DOCUMENTS_MESSAGE,
};
use super::resolver::DocumentResolver;
use super::session::{PendingClarification, Session};
use super::{AgentError, AgentReply, Attachment, ReplyKind, UserMessage};

/// Fallback name for attachments without a file name.
const UPLOAD_FALLBACK_NAME: &str = "uploaded_file";

/// Earlier exchanges sent along with an answer request.
const MAX_HISTORY_TURNS: usize = 10;

/// What a dispatched command leads to.
enum Step {
    Run(AgentCommand),
    Reply(AgentReply),
}

/// Inputs shared by every command of one turn.
struct Turn<'a> {
    /// Text the user sent this turn
    query: &'a str,
    /// Question being answered (the pending one for follow-ups)
    question: String,
    /// Reference set listed at the start of the turn
    names: &'a [String],
}

/// A document question-answering agent.
pub struct DocumentAgent {
    definition: AgentDefinition,
    llm: Arc<dyn LlmClient>,
    store: SharedArtifactStore,
    resolver: DocumentResolver,
}

impl DocumentAgent {
    pub fn new(
        definition: AgentDefinition,
        llm: Arc<dyn LlmClient>,
        store: SharedArtifactStore,
    ) -> Self {
        let resolver = DocumentResolver::new(llm.clone(), definition.model.clone());
        Self {
            definition,
            llm,
            store,
            resolver,
        }
    }

    /// Build an agent on the configured model backend and artifact store.
    pub fn from_config(config: &Config, definition: AgentDefinition) -> Result<Self, AgentError> {
        let llm: Arc<dyn LlmClient> =
            Arc::new(GeminiClient::new(&config.backend, config.request_timeout)?);
        let store = storage::from_config(&config.storage, config.request_timeout)?;
        Ok(Self::new(definition, llm, store))
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn store(&self) -> &SharedArtifactStore {
        &self.store
    }

    /// Handle one user turn to completion.
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        message: UserMessage,
    ) -> Result<AgentReply, AgentError> {
        if let Some(attachment) = message.attachment {
            return self.save_upload(session, &message.text, attachment).await;
        }

        let query = message.text.trim();
        if query.is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        let names = self.store.names().await?;
        if names.is_empty() {
            let reply = AgentReply::new(ReplyKind::NoDocuments, NO_DOCUMENTS_MESSAGE);
            session.push_turn(Content::user_text(query), Content::model_text(&reply.text));
            return Ok(reply);
        }

        self.run_turn(session, query, &names).await
    }

    /// Resolve and answer one question. A failed turn, whether an `Error`
    /// reply or an `Err`, leaves any clarification it answered pending.
    async fn run_turn(
        &self,
        session: &mut Session,
        query: &str,
        names: &[String],
    ) -> Result<AgentReply, AgentError> {
        let pending = session.begin_resolving()?;
        let result = self
            .resolve_and_answer(session, query, names, pending.as_ref())
            .await;

        match &result {
            Ok(reply) if reply.kind != ReplyKind::Error => {}
            _ => session.abandon(pending),
        }
        let reply = result?;
        if reply.kind != ReplyKind::Answer {
            session.push_turn(Content::user_text(query), Content::model_text(&reply.text));
        }
        Ok(reply)
    }

    async fn resolve_and_answer(
        &self,
        session: &mut Session,
        query: &str,
        names: &[String],
        pending: Option<&PendingClarification>,
    ) -> Result<AgentReply, AgentError> {
        let turn = Turn {
            query,
            question: pending
                .map(|p| p.question.clone())
                .unwrap_or_else(|| query.to_string()),
            names,
        };

        let first = match self.definition.variant {
            AgentVariant::Single => self.plan_single(&turn),
            AgentVariant::Multi => {
                let (resolver_query, candidates) = match pending {
                    Some(p) => (
                        follow_up_query(&p.question, query),
                        follow_up_candidates(p, names),
                    ),
                    None => (query.to_string(), names.to_vec()),
                };
                match self.resolver.resolve(&resolver_query, &candidates).await {
                    Ok(resolution) => Step::Run(resolution.into()),
                    Err(e) => {
                        tracing::warn!(session = %session.id, "Document resolution failed: {}", e);
                        Step::Reply(AgentReply::new(
                            ReplyKind::Error,
                            resolution_failed_message(&e),
                        ))
                    }
                }
            }
        };

        let mut step = first;
        loop {
            match step {
                Step::Reply(reply) => return Ok(reply),
                Step::Run(command) => {
                    tracing::debug!(session = %session.id, command = command.name(), "Dispatching");
                    step = self.dispatch(session, &turn, command).await?;
                }
            }
        }
    }

    /// The single-document agent always loads its one document.
    fn plan_single(&self, turn: &Turn<'_>) -> Step {
        if let Some(document) = &self.definition.document {
            return Step::Run(AgentCommand::LoadDocument {
                name: document.clone(),
            });
        }
        match turn.names {
            [only] => Step::Run(AgentCommand::LoadDocument { name: only.clone() }),
            names => Step::Reply(AgentReply::new(
                ReplyKind::Error,
                single_document_choice_message(names),
            )),
        }
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        turn: &Turn<'_>,
        command: AgentCommand,
    ) -> Result<Step, AgentError> {
        match command {
            AgentCommand::LoadDocument { name } => Ok(self.load_document(turn, name).await),
            AgentCommand::Disambiguate { candidates } => {
                session.mark_clarifying(&turn.question, candidates.clone())?;
                Ok(Step::Reply(
                    AgentReply::new(ReplyKind::Clarification, clarification_message(&candidates))
                        .with_candidates(candidates),
                ))
            }
            AgentCommand::ReportNotFound => {
                session.mark_not_found()?;
                Ok(Step::Reply(AgentReply::new(
                    ReplyKind::NotFound,
                    not_found_message(turn.names),
                )))
            }
            AgentCommand::Answer { document } => {
                let reply = self.answer(session, turn, &document).await?;
                Ok(Step::Reply(reply))
            }
        }
    }

    async fn load_document(&self, turn: &Turn<'_>, name: String) -> Step {
        // A loaded document must come from this turn's reference set.
        if !turn.names.contains(&name) {
            return Step::Reply(
                AgentReply::new(ReplyKind::Error, missing_artifact_message(&name))
                    .with_document(name),
            );
        }

        match self.store.load(&name).await {
            Ok(Some(document)) => Step::Run(AgentCommand::Answer { document }),
            Ok(None) => Step::Reply(
                AgentReply::new(ReplyKind::Error, missing_artifact_message(&name))
                    .with_document(name),
            ),
            Err(e) => {
                tracing::warn!("Failed to load '{}': {}", name, e);
                Step::Reply(
                    AgentReply::new(ReplyKind::Error, unreadable_artifact_message(&name, &e))
                        .with_document(name),
                )
            }
        }
    }

    async fn answer(
        &self,
        session: &mut Session,
        turn: &Turn<'_>,
        document: &Artifact,
    ) -> Result<AgentReply, AgentError> {
        let mut parts = vec![Part::text(turn.query)];
        if self.definition.variant == AgentVariant::Multi {
            parts.push(Part::text(available_documents(turn.names)));
        }
        parts.push(Part::text(format!("Document '{}':", document.name)));
        parts.push(document_part(document));

        let mut contents = session.recent_history(MAX_HISTORY_TURNS).to_vec();
        contents.push(Content::user(parts));

        let request = GenerateRequest {
            model: self.definition.model.clone(),
            system_instruction: Some(self.definition.instruction().to_string()),
            contents,
            config: GenerationConfig::default(),
        };
        let response = self.llm.generate(&request).await?;
        if let Some(usage) = response.usage {
            tracing::debug!(
                session = %session.id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Answer token usage"
            );
        }
        let text = response.text.trim().to_string();

        session.mark_loaded(&document.name)?;
        session.push_turn(Content::user_text(turn.query), Content::model_text(&text));
        tracing::info!(session = %session.id, document = %document.name, "Answered from document");

        Ok(AgentReply::new(ReplyKind::Answer, text).with_document(&document.name))
    }

    async fn save_upload(
        &self,
        session: &mut Session,
        text: &str,
        attachment: Attachment,
    ) -> Result<AgentReply, AgentError> {
        let name = match attachment.name.trim() {
            "" => UPLOAD_FALLBACK_NAME.to_string(),
            n => n.to_string(),
        };
        let mut artifact = Artifact::new(&name, attachment.data);
        if let Some(mime_type) = attachment.mime_type {
            artifact = artifact.with_mime_type(mime_type);
        }
        self.store.save(&artifact).await?;
        tracing::info!(session = %session.id, "Saved uploaded artifact '{}'", name);

        let reply = AgentReply::new(ReplyKind::Saved, saved_message(&name)).with_document(&name);
        let user_text = if text.trim().is_empty() {
            format!("[uploaded {}]", name)
        } else {
            text.trim().to_string()
        };
        session.push_turn(Content::user_text(user_text), Content::model_text(&reply.text));
        Ok(reply)
    }
}

/// Pending candidates still in the set, or the whole set once none remain.
fn follow_up_candidates(pending: &PendingClarification, names: &[String]) -> Vec<String> {
    let listed: Vec<String> = pending
        .candidates
        .iter()
        .filter(|c| names.contains(c))
        .cloned()
        .collect();
    if listed.is_empty() {
        names.to_vec()
    } else {
        listed
    }
}

/// Text documents travel as text; everything else as inline data.
fn document_part(document: &Artifact) -> Part {
    if document.mime_type.starts_with("text/") {
        if let Ok(text) = std::str::from_utf8(&document.data) {
            return Part::text(text);
        }
    }
    Part::inline(&document.mime_type, &document.data)
}
