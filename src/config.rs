//! Configuration management for contract-qna.
//!
//! Configuration is read from environment variables:
//! - `GOOGLE_GENAI_USE_VERTEXAI` - Optional. Use Vertex AI (default) or the Gemini API.
//! - `GOOGLE_CLOUD_PROJECT` - Required for Vertex AI. Google Cloud project id.
//! - `GOOGLE_CLOUD_LOCATION` - Required for Vertex AI. Region, e.g. `us-east4`.
//! - `GOOGLE_OAUTH_ACCESS_TOKEN` - Required for Vertex AI and GCS. Bearer token.
//! - `GOOGLE_API_KEY` - Required when Vertex AI is disabled.
//! - `DEFAULT_MODEL` - Optional. Agent model. Defaults to `gemini-2.5-flash`.
//! - `CONTRACT_BUCKET` - Optional. GCS bucket holding the documents. When unset,
//!   documents live in `ARTIFACT_DIR`.
//! - `CONTRACT_PREFIX` - Optional. Object prefix. Defaults to `capstone/land-lease-agreements`.
//! - `ARTIFACT_DIR` - Optional. Local document directory. Defaults to `.contract-qna/artifacts`.
//! - `AGENT_CONFIG` - Optional. YAML file overriding the built-in agent definition.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Model/storage HTTP timeout. Defaults to `120`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PREFIX: &str = "capstone/land-lease-agreements";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Where model calls are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelBackend {
    /// Vertex AI, authenticated with an OAuth access token.
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
    /// Gemini API, authenticated with an API key.
    GeminiApi { api_key: String },
}

impl ModelBackend {
    /// Resolve the backend from `GOOGLE_GENAI_USE_VERTEXAI` and friends.
    pub fn from_env() -> Result<Self, ConfigError> {
        let use_vertex = optional_bool("GOOGLE_GENAI_USE_VERTEXAI")?.unwrap_or(true);

        if use_vertex {
            Ok(Self::Vertex {
                project: required("GOOGLE_CLOUD_PROJECT")?,
                location: required("GOOGLE_CLOUD_LOCATION")?,
                access_token: access_token_from_env()?,
            })
        } else {
            Ok(Self::GeminiApi {
                api_key: required("GOOGLE_API_KEY")?,
            })
        }
    }

    /// Vertex backend for an explicit project and location.
    pub fn vertex(project: &str, location: &str) -> Result<Self, ConfigError> {
        Ok(Self::Vertex {
            project: project.to_string(),
            location: location.to_string(),
            access_token: access_token_from_env()?,
        })
    }
}

/// Document storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Gcs {
        bucket: String,
        prefix: String,
        access_token: String,
    },
    Local {
        root: PathBuf,
    },
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("CONTRACT_BUCKET").ok().filter(|b| !b.trim().is_empty()) {
            Some(bucket) => Ok(Self::Gcs {
                bucket,
                prefix: std::env::var("CONTRACT_PREFIX")
                    .unwrap_or_else(|_| DEFAULT_PREFIX.to_string()),
                access_token: access_token_from_env()?,
            }),
            None => Ok(Self::Local {
                root: std::env::var("ARTIFACT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(".contract-qna/artifacts")),
            }),
        }
    }

    /// Human-readable location, e.g. `gs://bucket/prefix`.
    pub fn describe(&self) -> String {
        match self {
            Self::Gcs { bucket, prefix, .. } => format!("gs://{}/{}", bucket, prefix),
            Self::Local { root } => root.display().to_string(),
        }
    }
}

/// Agent service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model backend and credentials
    pub backend: ModelBackend,

    /// Model used by the agent for resolution and answers
    pub default_model: String,

    /// Document storage
    pub storage: StorageConfig,

    /// Optional YAML agent definition
    pub agent_config: Option<PathBuf>,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// HTTP timeout for model and storage calls
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when credentials for the selected
    /// backend are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = ModelBackend::from_env()?;
        let storage = StorageConfig::from_env()?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let agent_config = std::env::var("AGENT_CONFIG").ok().map(PathBuf::from);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        Ok(Self {
            backend,
            default_model,
            storage,
            agent_config,
            host,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(backend: ModelBackend, storage: StorageConfig) -> Self {
        Self {
            backend,
            default_model: DEFAULT_MODEL.to_string(),
            storage,
            agent_config: None,
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Read the OAuth access token used for Vertex AI and GCS.
pub fn access_token_from_env() -> Result<String, ConfigError> {
    required("GOOGLE_OAUTH_ACCESS_TOKEN")
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_bool(name: &str) -> Result<Option<bool>, ConfigError> {
    std::env::var(name)
        .ok()
        .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue(name.to_string(), e)))
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool(" off "), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn storage_describe_formats_bucket_uri() {
        let storage = StorageConfig::Gcs {
            bucket: "leases".to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            access_token: "t".to_string(),
        };
        assert_eq!(
            storage.describe(),
            "gs://leases/capstone/land-lease-agreements"
        );
    }

    #[test]
    fn new_uses_defaults() {
        let config = Config::new(
            ModelBackend::GeminiApi {
                api_key: "k".to_string(),
            },
            StorageConfig::Local {
                root: PathBuf::from("/tmp/docs"),
            },
        );
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.port, 8000);
        assert!(config.agent_config.is_none());
    }
}
