//! Typed agent operations.

use super::resolver::Resolution;
use crate::storage::Artifact;

/// The closed set of operations a turn can perform.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCommand {
    /// Fetch a document from the reference set.
    LoadDocument { name: String },
    /// Ask the user to choose among candidates.
    Disambiguate { candidates: Vec<String> },
    /// Tell the user no document matched.
    ReportNotFound,
    /// Answer the question with the loaded document in context.
    Answer { document: Artifact },
}

impl AgentCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadDocument { .. } => "load_document",
            Self::Disambiguate { .. } => "disambiguate",
            Self::ReportNotFound => "report_not_found",
            Self::Answer { .. } => "answer",
        }
    }
}

impl From<Resolution> for AgentCommand {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Resolved(name) => Self::LoadDocument { name },
            Resolution::Clarify(candidates) => Self::Disambiguate { candidates },
            Resolution::NotFound => Self::ReportNotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolutions_map_to_commands() {
        assert_eq!(
            AgentCommand::from(Resolution::Resolved("a.pdf".into())),
            AgentCommand::LoadDocument {
                name: "a.pdf".into()
            }
        );
        assert_eq!(
            AgentCommand::from(Resolution::NotFound).name(),
            "report_not_found"
        );
        assert_eq!(
            AgentCommand::from(Resolution::Clarify(vec!["a".into(), "b".into()])).name(),
            "disambiguate"
        );
    }
}
