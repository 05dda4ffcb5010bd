//! Declarative agent definitions.
//!
//! An agent is its instruction, model and variant. The two built-ins match
//! the single-document and multi-document agents; a YAML file can override
//! any field:
//!
//! ```yaml
//! name: document_agent
//! variant: multi
//! model: gemini-2.5-flash
//! instruction: |
//!   You answer questions about lease agreements.
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::prompt::{MULTI_DOCUMENT_INSTRUCTION, SINGLE_DOCUMENT_INSTRUCTION};
use super::AgentError;
use crate::config::{Config, DEFAULT_MODEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AgentVariant {
    /// One document, always in context
    Single,
    /// Many documents, resolved per question
    Multi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub variant: AgentVariant,
    #[serde(default)]
    pub instruction: Option<String>,
    /// Document preloaded by the single-document variant.
    #[serde(default)]
    pub document: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl AgentDefinition {
    pub fn single_document(document: Option<String>) -> Self {
        Self {
            name: "document_agent".to_string(),
            description: "An agent that can answer questions about a document.".to_string(),
            model: default_model(),
            variant: AgentVariant::Single,
            instruction: None,
            document,
        }
    }

    pub fn multi_document() -> Self {
        Self {
            name: "document_agent".to_string(),
            description: "An agent that can answer questions about a document.".to_string(),
            model: default_model(),
            variant: AgentVariant::Multi,
            instruction: None,
            document: None,
        }
    }

    pub fn builtin(variant: AgentVariant) -> Self {
        match variant {
            AgentVariant::Single => Self::single_document(None),
            AgentVariant::Multi => Self::multi_document(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Effective system instruction.
    pub fn instruction(&self) -> &str {
        self.instruction.as_deref().unwrap_or(match self.variant {
            AgentVariant::Single => SINGLE_DOCUMENT_INSTRUCTION,
            AgentVariant::Multi => MULTI_DOCUMENT_INSTRUCTION,
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, AgentError> {
        serde_yaml::from_str(contents).map_err(|e| AgentError::Definition(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Definition(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&contents)
    }

    /// Definition for a run: the `AGENT_CONFIG` file when set, otherwise the
    /// built-in for `variant` on the configured default model. Explicit
    /// arguments override the file.
    pub fn from_config(
        config: &Config,
        variant: Option<AgentVariant>,
        document: Option<String>,
    ) -> Result<Self, AgentError> {
        let mut definition = match &config.agent_config {
            Some(path) => Self::load(path)?,
            None => Self::builtin(variant.unwrap_or(AgentVariant::Multi))
                .with_model(config.default_model.clone()),
        };
        if let Some(variant) = variant {
            definition.variant = variant;
        }
        if document.is_some() {
            definition.document = document;
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_pick_variant_instruction() {
        assert_eq!(
            AgentDefinition::builtin(AgentVariant::Single).instruction(),
            SINGLE_DOCUMENT_INSTRUCTION
        );
        assert_eq!(
            AgentDefinition::builtin(AgentVariant::Multi).instruction(),
            MULTI_DOCUMENT_INSTRUCTION
        );
    }

    #[test]
    fn yaml_fills_defaults() {
        let def = AgentDefinition::from_yaml("name: leases\nvariant: multi\n").unwrap();
        assert_eq!(def.model, DEFAULT_MODEL);
        assert_eq!(def.variant, AgentVariant::Multi);
        assert_eq!(def.instruction(), MULTI_DOCUMENT_INSTRUCTION);
    }

    #[test]
    fn yaml_overrides_instruction_and_document() {
        let def = AgentDefinition::from_yaml(
            "name: one\nvariant: single\ndocument: lease_agreement_1.pdf\ninstruction: Be brief.\n",
        )
        .unwrap();
        assert_eq!(def.document.as_deref(), Some("lease_agreement_1.pdf"));
        assert_eq!(def.instruction(), "Be brief.");
    }

    #[test]
    fn invalid_yaml_is_a_definition_error() {
        let err = AgentDefinition::from_yaml("variant: sideways").unwrap_err();
        assert!(matches!(err, AgentError::Definition(_)));
    }

    fn local_config() -> Config {
        Config::new(
            crate::config::ModelBackend::GeminiApi {
                api_key: "key".to_string(),
            },
            crate::config::StorageConfig::Local {
                root: std::path::PathBuf::from("artifacts"),
            },
        )
    }

    #[test]
    fn from_config_uses_builtin_on_default_model() {
        let mut config = local_config();
        config.default_model = "gemini-2.5-pro".to_string();
        let def = AgentDefinition::from_config(
            &config,
            Some(AgentVariant::Single),
            Some("lease_agreement_2.pdf".to_string()),
        )
        .unwrap();
        assert_eq!(def.variant, AgentVariant::Single);
        assert_eq!(def.model, "gemini-2.5-pro");
        assert_eq!(def.document.as_deref(), Some("lease_agreement_2.pdf"));

        let def = AgentDefinition::from_config(&config, None, None).unwrap();
        assert_eq!(def.variant, AgentVariant::Multi);
    }

    #[test]
    fn from_config_prefers_agent_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, "name: leases\nvariant: single\nmodel: custom-model\n").unwrap();
        let mut config = local_config();
        config.agent_config = Some(path);

        let def = AgentDefinition::from_config(&config, None, None).unwrap();
        assert_eq!(def.name, "leases");
        assert_eq!(def.model, "custom-model");
        assert_eq!(def.variant, AgentVariant::Single);

        let def = AgentDefinition::from_config(&config, Some(AgentVariant::Multi), None).unwrap();
        assert_eq!(def.variant, AgentVariant::Multi);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, "name: file_agent\nvariant: single\n").unwrap();
        assert_eq!(AgentDefinition::load(&path).unwrap().name, "file_agent");
    }
}
