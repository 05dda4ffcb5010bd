//! Document reference resolution.
//!
//! The model judges which of the candidate documents a query refers to; the
//! resolver only interprets that judgment. It never matches strings itself
//! and never picks a document when the judgment is ambiguous or malformed.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use super::prompt::resolution_prompt;
use crate::llm::{GenerateRequest, GenerationConfig, LlmClient, LlmError};

/// Bare reply signalling ambiguity.
const UNSURE: &str = "UNSURE";

/// Outcome of resolving a query against the reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one document matches.
    Resolved(String),
    /// Several documents match; the user must pick one.
    Clarify(Vec<String>),
    /// No document matches.
    NotFound,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolution model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("unparseable resolution judgment: {0}")]
    Unparseable(String),

    #[error("judgment named unknown document '{0}'")]
    UnknownDocument(String),

    #[error("judgment said single match but named {0} documents")]
    InvalidSingle(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Verdict {
    Single,
    Multiple,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct Judgment {
    verdict: Verdict,
    #[serde(default)]
    documents: Vec<String>,
}

/// Strip an optional markdown code fence around the reply.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse the model reply into a judgment.
///
/// Accepts the JSON form requested by [`resolution_prompt`] and the bare
/// form (a document name, or `UNSURE`).
fn parse_judgment(reply: &str, candidates: &[String]) -> Result<Judgment, ResolveError> {
    let body = strip_fence(reply);

    if let Ok(judgment) = serde_json::from_str::<Judgment>(body) {
        return Ok(judgment);
    }

    let bare = body
        .trim_start_matches("- ")
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    if bare == UNSURE {
        return Ok(Judgment {
            verdict: Verdict::Multiple,
            documents: Vec::new(),
        });
    }
    if candidates.iter().any(|c| c == bare) {
        return Ok(Judgment {
            verdict: Verdict::Single,
            documents: vec![bare.to_string()],
        });
    }

    Err(ResolveError::Unparseable(body.to_string()))
}

/// Map a judgment onto the candidate set.
fn interpret(judgment: Judgment, candidates: &[String]) -> Result<Resolution, ResolveError> {
    match judgment.verdict {
        Verdict::None => Ok(Resolution::NotFound),
        Verdict::Single => {
            let [name] = judgment.documents.as_slice() else {
                return Err(ResolveError::InvalidSingle(judgment.documents.len()));
            };
            if candidates.contains(name) {
                Ok(Resolution::Resolved(name.clone()))
            } else {
                Err(ResolveError::UnknownDocument(name.clone()))
            }
        }
        Verdict::Multiple => {
            // Keep candidate order; drop names the model invented. A lone
            // named candidate is still confirmed with the user.
            let named: Vec<String> = candidates
                .iter()
                .filter(|c| judgment.documents.contains(c))
                .cloned()
                .collect();
            if named.is_empty() {
                Ok(Resolution::Clarify(candidates.to_vec()))
            } else {
                Ok(Resolution::Clarify(named))
            }
        }
    }
}

/// Resolves queries with a model-backed judgment.
#[derive(Clone)]
pub struct DocumentResolver {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl DocumentResolver {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Resolve `query` against `candidates`.
    ///
    /// An empty candidate set is `NotFound` without a model call. Candidates
    /// are sorted and deduplicated first so identical inputs always produce
    /// identical requests.
    pub async fn resolve(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<Resolution, ResolveError> {
        let mut candidates = candidates.to_vec();
        candidates.sort();
        candidates.dedup();

        if candidates.is_empty() {
            return Ok(Resolution::NotFound);
        }

        let request = GenerateRequest::prompt(&self.model, resolution_prompt(query, &candidates))
            .with_config(GenerationConfig {
                temperature: Some(0.0),
                response_mime_type: Some("application/json".to_string()),
                ..GenerationConfig::default()
            });

        let response = self.llm.generate(&request).await?;
        tracing::debug!(
            reply = %response.text.trim(),
            usage = ?response.usage,
            "Resolution judgment"
        );

        let resolution = interpret(parse_judgment(&response.text, &candidates)?, &candidates)?;
        tracing::info!(?resolution, "Resolved document reference");
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLlm;

    fn plots() -> Vec<String> {
        vec![
            "Lease Agreement - Plot 12".to_string(),
            "Lease Agreement - Plot 45".to_string(),
        ]
    }

    fn resolver(llm: &Arc<ScriptedLlm>) -> DocumentResolver {
        DocumentResolver::new(llm.clone(), "gemini-2.5-flash")
    }

    #[tokio::test]
    async fn unique_match_resolves_to_that_document() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"verdict": "single", "documents": ["Lease Agreement - Plot 12"]}"#,
        ));
        let resolution = resolver(&llm)
            .resolve("what is the rent for plot 12?", &plots())
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Resolved("Lease Agreement - Plot 12".to_string())
        );

        let request = &llm.requests()[0];
        assert_eq!(request.config.response_mime_type.as_deref(), Some("application/json"));
        assert!(request.contents[0].text().contains("what is the rent for plot 12?"));
    }

    #[tokio::test]
    async fn ambiguous_query_requests_clarification() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"verdict": "multiple", "documents": ["Lease Agreement - Plot 45", "Lease Agreement - Plot 12"]}"#,
        ));
        let resolution = resolver(&llm).resolve("what is the rent?", &plots()).await.unwrap();
        assert_eq!(resolution, Resolution::Clarify(plots()));
    }

    #[tokio::test]
    async fn multiple_with_one_known_name_clarifies_that_name() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"verdict": "multiple", "documents": ["Lease Agreement - Plot 12", "Plot 99"]}"#,
        ));
        let resolution = resolver(&llm).resolve("rent?", &plots()).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Clarify(vec!["Lease Agreement - Plot 12".to_string()])
        );
    }

    #[tokio::test]
    async fn multiple_naming_nothing_known_clarifies_over_all() {
        let llm = Arc::new(
            ScriptedLlm::new().reply(r#"{"verdict": "multiple", "documents": ["Plot 99"]}"#),
        );
        let resolution = resolver(&llm).resolve("rent?", &plots()).await.unwrap();
        assert_eq!(resolution, Resolution::Clarify(plots()));
    }

    #[tokio::test]
    async fn no_match_is_not_found() {
        let llm = Arc::new(ScriptedLlm::new().reply(r#"{"verdict": "none", "documents": []}"#));
        let resolution = resolver(&llm)
            .resolve("what is the rent for plot 77?", &plots())
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::NotFound);
    }

    #[tokio::test]
    async fn empty_reference_set_skips_the_model() {
        let llm = Arc::new(ScriptedLlm::new());
        let resolution = resolver(&llm).resolve("anything", &[]).await.unwrap();
        assert_eq!(resolution, Resolution::NotFound);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_for_unchanged_set() {
        let reply = r#"{"verdict": "single", "documents": ["Lease Agreement - Plot 12"]}"#;
        let llm = Arc::new(ScriptedLlm::new().reply(reply).reply(reply));
        let r = resolver(&llm);

        let mut reversed = plots();
        reversed.reverse();
        let first = r.resolve("rent for plot 12", &plots()).await.unwrap();
        let second = r.resolve("rent for plot 12", &reversed).await.unwrap();
        assert_eq!(first, second);

        let requests = llm.requests();
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn bare_replies_are_understood() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply("Lease Agreement - Plot 45\n")
                .reply("UNSURE"),
        );
        let r = resolver(&llm);
        assert_eq!(
            r.resolve("plot 45 rent", &plots()).await.unwrap(),
            Resolution::Resolved("Lease Agreement - Plot 45".to_string())
        );
        assert_eq!(
            r.resolve("rent", &plots()).await.unwrap(),
            Resolution::Clarify(plots())
        );
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            "```json\n{\"verdict\": \"single\", \"documents\": [\"Lease Agreement - Plot 12\"]}\n```",
        ));
        assert_eq!(
            resolver(&llm).resolve("plot 12", &plots()).await.unwrap(),
            Resolution::Resolved("Lease Agreement - Plot 12".to_string())
        );
    }

    #[tokio::test]
    async fn unparseable_judgment_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new().reply("I think it is probably the first one"));
        let err = resolver(&llm).resolve("rent", &plots()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unparseable(_)));
    }

    #[tokio::test]
    async fn single_naming_unknown_document_is_an_error() {
        let llm = Arc::new(
            ScriptedLlm::new().reply(r#"{"verdict": "single", "documents": ["Plot 99"]}"#),
        );
        let err = resolver(&llm).resolve("plot 99", &plots()).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownDocument(name) if name == "Plot 99"));
    }

    #[tokio::test]
    async fn single_with_several_names_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new().reply(
            r#"{"verdict": "single", "documents": ["Lease Agreement - Plot 12", "Lease Agreement - Plot 45"]}"#,
        ));
        let err = resolver(&llm).resolve("rent", &plots()).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSingle(2)));
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new().fail("unavailable"));
        let err = resolver(&llm).resolve("rent", &plots()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Llm(_)));
    }
}
