//! CLI definitions using clap derive API

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::agent::{AgentDefinition, AgentVariant, DocumentAgent};
use crate::config::{Config, ModelBackend, DEFAULT_PREFIX};
use crate::generator::{
    DocumentRenderer, GeneratorOptions, LeaseGenerator, PdfRenderer, PlainTextRenderer,
};
use crate::llm::{GeminiClient, LlmClient};
use crate::storage::GcsStore;
use crate::{api, config, console};

/// Question answering over land-lease agreements.
#[derive(Parser, Debug)]
#[command(name = "contract-qna", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate synthetic lease agreements and upload them to GCS
    Generate(GenerateArgs),

    /// Chat with the document agent in the terminal
    Chat(ChatArgs),

    /// Serve the agent over HTTP
    Serve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Pdf,
    Txt,
}

impl DocumentFormat {
    fn renderer(self) -> Box<dyn DocumentRenderer> {
        match self {
            Self::Pdf => Box::new(PdfRenderer),
            Self::Txt => Box::new(PlainTextRenderer),
        }
    }
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Google Cloud project ID
    #[arg(long)]
    pub project_id: String,

    /// Vertex AI location (e.g. us-central1 or global)
    #[arg(long)]
    pub location: String,

    /// Number of agreements to generate
    #[arg(long, default_value_t = 3)]
    pub number: usize,

    /// GCS bucket name
    #[arg(long)]
    pub bucket_name: String,

    /// Object prefix inside the bucket
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub gcs_path: String,

    /// Output document format
    #[arg(long, value_enum, default_value_t = DocumentFormat::Pdf)]
    pub format: DocumentFormat,

    /// Model for tenant company names
    #[arg(long, default_value = "gemini-2.5-flash")]
    pub name_model: String,

    /// Model for the agreement text
    #[arg(long, default_value = "gemini-2.5-pro")]
    pub lease_model: String,
}

#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Agent variant; defaults to the AGENT_CONFIG file or `multi`
    #[arg(long, value_enum)]
    pub agent: Option<AgentVariant>,

    /// Document preloaded by the single-document agent
    #[arg(long)]
    pub document: Option<String>,
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => generate(args).await,
        Commands::Chat(args) => chat(args).await,
        Commands::Serve => {
            let config = load_config()?;
            api::serve(config).await
        }
    }
}

async fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let timeout = std::time::Duration::from_secs(300);
    let backend = ModelBackend::vertex(&args.project_id, &args.location)?;
    let llm: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(&backend, timeout)?);
    let store = Arc::new(GcsStore::new(
        &args.bucket_name,
        &args.gcs_path,
        &config::access_token_from_env()?,
        timeout,
    )?);

    info!(
        "Generating {} agreement(s) into gs://{}/{}",
        args.number, args.bucket_name, args.gcs_path
    );
    let generator = LeaseGenerator::new(llm, store)
        .with_renderer(args.format.renderer())
        .with_options(GeneratorOptions {
            name_model: args.name_model,
            lease_model: args.lease_model,
        });

    let report = generator.run(args.number).await;
    for name in &report.uploaded {
        println!("Uploaded {}", name);
    }
    if !report.is_success() {
        bail!(
            "{} of {} agreement(s) failed:\n{}",
            report.failures.len(),
            args.number,
            report.failures.join("\n")
        );
    }
    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={} documents={}",
        config.default_model,
        config.storage.describe()
    );
    Ok(config)
}

async fn chat(args: ChatArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let definition = AgentDefinition::from_config(&config, args.agent, args.document)?;
    let agent = DocumentAgent::from_config(&config, definition)
        .context("Failed to set up the document agent")?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console::run(&agent, stdin, tokio::io::stdout()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_applies_defaults() {
        let cli = Cli::try_parse_from([
            "contract-qna",
            "generate",
            "--project-id",
            "demo",
            "--location",
            "us-central1",
            "--bucket-name",
            "leases",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.number, 3);
        assert_eq!(args.gcs_path, DEFAULT_PREFIX);
        assert_eq!(args.format, DocumentFormat::Pdf);
        assert_eq!(args.lease_model, "gemini-2.5-pro");
    }

    #[test]
    fn generate_requires_bucket() {
        let err = Cli::try_parse_from([
            "contract-qna",
            "generate",
            "--project-id",
            "demo",
            "--location",
            "global",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn chat_parses_variant_and_document() {
        let cli = Cli::try_parse_from([
            "contract-qna",
            "chat",
            "--agent",
            "single",
            "--document",
            "lease_agreement_1.pdf",
        ])
        .unwrap();
        let Commands::Chat(args) = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(args.agent, Some(AgentVariant::Single));
        assert_eq!(args.document.as_deref(), Some("lease_agreement_1.pdf"));
    }

    #[test]
    fn format_selects_renderer() {
        assert_eq!(DocumentFormat::Txt.renderer().extension(), "txt");
        assert_eq!(DocumentFormat::Pdf.renderer().mime_type(), "application/pdf");
    }
}
