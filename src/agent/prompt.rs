//! Instruction and prompt templates for the document agents.

/// Instruction for the agent that already has its document in context.
pub const SINGLE_DOCUMENT_INSTRUCTION: &str = "You are a helpful assistant that can answer questions about a \
document. The document is already in your context. \
Answer the user's questions based on the document.";

/// Instruction for the agent that chooses among several documents.
pub const MULTI_DOCUMENT_INSTRUCTION: &str = r#"You are a helpful assistant that can answer questions about one or more documents.
- If the user asks a question and there is only one document, answer the question based on that document.
- If the user asks a question and there are multiple documents, first ask the user to clarify which document they are referring to.
- The list of available documents is provided below.
- Answer only from the attached document. If it does not contain the answer, say so."#;

pub const NO_DOCUMENTS_MESSAGE: &str = "Please upload a document before asking a question.";

/// Bullet list of document names.
pub fn document_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("- {}", n))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text part listing the reference set for the answer model.
pub fn available_documents(names: &[String]) -> String {
    format!("Available documents:\n{}", document_list(names))
}

/// Ask the model which document the user means.
pub fn resolution_prompt(query: &str, candidates: &[String]) -> String {
    format!(
        r#"The user said: "{query}"
Here are the available documents:
{documents}

Which document is the user referring to?
Respond with a JSON object of the form {{"verdict": "...", "documents": [...]}} where verdict is:
- "single" when exactly one document matches; put its exact name in "documents".
- "multiple" when more than one document could match; list every matching name in "documents".
- "none" when no document matches.
Only use names exactly as they appear in the list."#,
        query = query,
        documents = document_list(candidates)
    )
}

/// Query text for a follow-up that answers a clarification request.
pub fn follow_up_query(question: &str, follow_up: &str) -> String {
    format!(
        "{}\n(The user was asked which document they meant and replied: \"{}\")",
        question, follow_up
    )
}

pub fn clarification_message(candidates: &[String]) -> String {
    format!(
        "I'm not sure which document you are referring to. Please clarify. Here are the matching documents:\n{}",
        document_list(candidates)
    )
}

pub fn not_found_message(names: &[String]) -> String {
    format!(
        "I could not find a document matching your question. Here are the available documents:\n{}",
        document_list(names)
    )
}

pub fn resolution_failed_message(error: &impl std::fmt::Display) -> String {
    format!(
        "Sorry, I could not determine which document you are referring to ({}). Please try again or name the document.",
        error
    )
}

pub fn single_document_choice_message(names: &[String]) -> String {
    format!(
        "This agent answers questions about a single document, but several are available. Choose one of:\n{}",
        document_list(names)
    )
}

pub fn saved_message(name: &str) -> String {
    format!("I have saved '{}'.", name)
}

pub fn missing_artifact_message(name: &str) -> String {
    format!("Sorry, I could not load the artifact '{}'.", name)
}

pub fn unreadable_artifact_message(name: &str, error: &impl std::fmt::Display) -> String {
    format!("Sorry, I could not read '{}': {}", name, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_prompt_lists_candidates_and_quotes_query() {
        let prompt = resolution_prompt(
            "what is the rent for plot 12?",
            &["Lease Agreement - Plot 12".to_string(), "Lease Agreement - Plot 45".to_string()],
        );
        assert!(prompt.starts_with("The user said: \"what is the rent for plot 12?\""));
        assert!(prompt.contains("- Lease Agreement - Plot 12\n- Lease Agreement - Plot 45"));
        assert!(prompt.contains(r#"{"verdict": "...", "documents": [...]}"#));
    }

    #[test]
    fn clarification_lists_each_candidate() {
        let msg = clarification_message(&["a.pdf".to_string(), "b.pdf".to_string()]);
        assert!(msg.ends_with("- a.pdf\n- b.pdf"));
    }
}
