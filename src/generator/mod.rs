//! Synthetic land-lease agreement generator.
//!
//! For each agreement a fast model invents the tenant company, a stronger
//! model writes the full agreement, and the result is rendered and uploaded
//! to the artifact store as `lease_agreement_<n>.<ext>`. Failures are
//! collected in the [`GenerationReport`]; nothing is retried.

mod prompt;
mod render;

use std::sync::Arc;

use thiserror::Error;

use crate::llm::{GenerateRequest, GenerationConfig, LlmClient, LlmError};
use crate::storage::{Artifact, SharedArtifactStore, StorageError};

pub use prompt::{clean_company_name, company_name_prompt, lease_agreement_prompt, LANDLORD};
pub use render::{render_pdf, DocumentRenderer, PdfRenderer, PlainTextRenderer, RenderError};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Failed to generate {what}: {source}")]
    Model {
        what: String,
        #[source]
        source: LlmError,
    },

    #[error("Model returned no usable {0}")]
    EmptyOutput(String),

    #[error("Failed to render '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: RenderError,
    },

    #[error("Failed to upload '{name}': {source}")]
    Upload {
        name: String,
        #[source]
        source: StorageError,
    },
}

/// Models used for generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    /// Cheap model for tenant names
    pub name_model: String,
    /// Strong model for the agreement body
    pub lease_model: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            name_model: "gemini-2.5-flash".to_string(),
            lease_model: "gemini-2.5-pro".to_string(),
        }
    }
}

/// One generated agreement before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Agreement {
    pub tenant: String,
    pub text: String,
}

/// Outcome of a generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Names of uploaded artifacts
    pub uploaded: Vec<String>,
    /// One message per failed agreement
    pub failures: Vec<String>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct LeaseGenerator {
    llm: Arc<dyn LlmClient>,
    store: SharedArtifactStore,
    renderer: Box<dyn DocumentRenderer>,
    options: GeneratorOptions,
}

impl LeaseGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, store: SharedArtifactStore) -> Self {
        Self {
            llm,
            store,
            renderer: Box::new(PdfRenderer),
            options: GeneratorOptions::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Ask the fast model for a tenant company name.
    pub async fn generate_company_name(&self) -> Result<String, GenerateError> {
        let request = GenerateRequest::prompt(&self.options.name_model, company_name_prompt());
        let response = self
            .llm
            .generate(&request)
            .await
            .map_err(|source| GenerateError::Model {
                what: "company name".to_string(),
                source,
            })?;

        tracing::debug!(usage = ?response.usage, "Company name token usage");
        let name = clean_company_name(&response.text);
        if name.is_empty() {
            return Err(GenerateError::EmptyOutput("company name".to_string()));
        }
        Ok(name)
    }

    /// Ask the strong model for a complete agreement for `tenant`.
    pub async fn generate_lease_agreement(&self, tenant: &str) -> Result<String, GenerateError> {
        let request = GenerateRequest::prompt(&self.options.lease_model, lease_agreement_prompt(tenant))
            .with_config(GenerationConfig {
                temperature: Some(0.8),
                top_k: Some(40),
                top_p: Some(0.8),
                thinking_budget: Some(-1),
                response_mime_type: None,
            });

        let response = self
            .llm
            .generate(&request)
            .await
            .map_err(|source| GenerateError::Model {
                what: format!("lease agreement for {}", tenant),
                source,
            })?;

        tracing::debug!(usage = ?response.usage, "Lease agreement token usage");
        let text = response.text.trim().to_string();
        if text.is_empty() {
            return Err(GenerateError::EmptyOutput("lease agreement".to_string()));
        }
        Ok(text)
    }

    async fn generate_one(&self) -> Result<Agreement, GenerateError> {
        tracing::info!("Generating tenant name with {}", self.options.name_model);
        let tenant = self.generate_company_name().await?;
        tracing::info!(tenant = %tenant, "Tenant name generated");

        tracing::info!(
            "Generating lease for {} with {}",
            tenant,
            self.options.lease_model
        );
        let text = self.generate_lease_agreement(&tenant).await?;
        Ok(Agreement { tenant, text })
    }

    /// Generate `count` agreements sequentially.
    pub async fn simulate_agreements(&self, count: usize) -> Vec<Result<Agreement, GenerateError>> {
        tracing::info!("Starting generation of {} land lease agreements", count);
        let mut agreements = Vec::with_capacity(count);
        for i in 0..count {
            tracing::info!("Agreement {} of {}", i + 1, count);
            agreements.push(self.generate_one().await);
        }
        agreements
    }

    /// Artifact name for the 1-based agreement number.
    pub fn file_name(&self, number: usize) -> String {
        format!("lease_agreement_{}.{}", number, self.renderer.extension())
    }

    /// Render and upload one agreement, returning the artifact name.
    pub async fn publish(&self, number: usize, agreement: &Agreement) -> Result<String, GenerateError> {
        let name = self.file_name(number);
        let data = self
            .renderer
            .render(&agreement.text)
            .map_err(|source| GenerateError::Render {
                name: name.clone(),
                source,
            })?;
        let artifact = Artifact::new(&name, data)
            .with_mime_type(self.renderer.mime_type())
            .with_metadata("tenant", &agreement.tenant)
            .with_metadata("landlord", LANDLORD)
            .with_metadata("model", &self.options.lease_model);

        self.store
            .save(&artifact)
            .await
            .map_err(|source| GenerateError::Upload {
                name: name.clone(),
                source,
            })?;
        tracing::info!("Stored '{}' in {}", name, self.store.describe());
        Ok(name)
    }

    /// Generate, render and upload `count` agreements.
    pub async fn run(&self, count: usize) -> GenerationReport {
        let mut report = GenerationReport::default();

        for (i, result) in self.simulate_agreements(count).await.into_iter().enumerate() {
            let number = i + 1;
            let outcome = match result {
                Ok(agreement) => self.publish(number, &agreement).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(name) => report.uploaded.push(name),
                Err(e) => {
                    tracing::error!("Agreement {} failed: {}", number, e);
                    report.failures.push(format!("agreement {}: {}", number, e));
                }
            }
        }

        report
    }
}
