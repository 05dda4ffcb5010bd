//! Gemini `generateContent` client for Vertex AI and the Gemini API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    Content, GenerateRequest, GenerateResponse, GenerationConfig, LlmClient, LlmError, Part, Usage,
};
use crate::config::ModelBackend;

/// Endpoint URL builders.
pub mod endpoint {
    /// Vertex AI publisher model endpoint. The `global` location has no
    /// regional host prefix.
    pub fn vertex(project: &str, location: &str, model: &str) -> String {
        let host = if location == "global" {
            "aiplatform.googleapis.com".to_string()
        } else {
            format!("{location}-aiplatform.googleapis.com")
        };
        format!(
            "https://{host}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
        )
    }

    /// Gemini API (API key) endpoint.
    pub fn gemini_api(model: &str) -> String {
        format!("https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent")
    }
}

#[derive(Debug, Clone)]
enum Target {
    Vertex { project: String, location: String },
    GeminiApi,
}

/// HTTP client for Gemini models.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    headers: HeaderMap,
    target: Target,
}

impl GeminiClient {
    /// Build a client for the configured backend.
    pub fn new(backend: &ModelBackend, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let target = match backend {
            ModelBackend::Vertex {
                project,
                location,
                access_token,
            } => {
                headers.insert(
                    header::AUTHORIZATION,
                    format!("Bearer {access_token}")
                        .parse()
                        .map_err(|_| LlmError::InvalidConfig("access token".to_string()))?,
                );
                Target::Vertex {
                    project: project.clone(),
                    location: location.clone(),
                }
            }
            ModelBackend::GeminiApi { api_key } => {
                headers.insert(
                    "x-goog-api-key",
                    api_key
                        .parse()
                        .map_err(|_| LlmError::InvalidConfig("API key".to_string()))?,
                );
                Target::GeminiApi
            }
        };

        Ok(Self {
            client,
            headers,
            target,
        })
    }

    fn url(&self, model: &str) -> String {
        match &self.target {
            Target::Vertex { project, location } => endpoint::vertex(project, location, model),
            Target::GeminiApi => endpoint::gemini_api(model),
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let body = WireRequest::from(request);
        tracing::debug!(
            model = %request.model,
            turns = request.contents.len(),
            "Calling generateContent"
        );

        let response = self
            .client
            .post(self.url(&request.model))
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: extract_error_message(&message),
            });
        }

        let wire: WireResponse = response.json().await?;
        wire.into_response()
    }
}

/// Pull `error.message` out of a Google API error body, or return it raw.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct WireSystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<WireThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireThinkingConfig {
    thinking_budget: i32,
}

impl<'a> From<&'a GenerateRequest> for WireRequest<'a> {
    fn from(request: &'a GenerateRequest) -> Self {
        let c = &request.config;
        let generation_config = if *c == GenerationConfig::default() {
            None
        } else {
            Some(WireGenerationConfig {
                temperature: c.temperature,
                top_k: c.top_k,
                top_p: c.top_p,
                thinking_config: c
                    .thinking_budget
                    .map(|thinking_budget| WireThinkingConfig { thinking_budget }),
                response_mime_type: c.response_mime_type.clone(),
            })
        };

        Self {
            contents: &request.contents,
            system_instruction: request
                .system_instruction
                .as_ref()
                .map(|text| WireSystemInstruction {
                    parts: vec![Part::text(text.clone())],
                }),
            generation_config,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    prompt_feedback: Option<WirePromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Response content; `role` is sometimes omitted.
#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl WireResponse {
    fn into_response(self) -> Result<GenerateResponse, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
                return Err(LlmError::Blocked(reason));
            }
            return Err(LlmError::EmptyResponse);
        }

        Ok(GenerateResponse {
            text,
            usage: self.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_endpoint_uses_regional_host() {
        assert_eq!(
            endpoint::vertex("demo", "us-east4", "gemini-2.5-flash"),
            "https://us-east4-aiplatform.googleapis.com/v1/projects/demo/locations/us-east4/publishers/google/models/gemini-2.5-flash:generateContent"
        );
        assert!(endpoint::vertex("demo", "global", "m")
            .starts_with("https://aiplatform.googleapis.com/"));
    }

    #[test]
    fn request_omits_default_generation_config() {
        let request = GenerateRequest::prompt("gemini-2.5-flash", "hello");
        let json = serde_json::to_value(WireRequest::from(&request)).unwrap();
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("systemInstruction").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn request_carries_sampling_and_thinking() {
        let mut request = GenerateRequest::prompt("gemini-2.5-pro", "lease").with_config(
            GenerationConfig {
                temperature: Some(0.8),
                top_k: Some(40),
                top_p: Some(0.8),
                thinking_budget: Some(-1),
                response_mime_type: None,
            },
        );
        request.system_instruction = Some("be precise".to_string());
        let json = serde_json::to_value(WireRequest::from(&request)).unwrap();
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["thinkingConfig"]["thinkingBudget"], -1);
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be precise");
    }

    #[test]
    fn response_joins_text_and_skips_thoughts() {
        let wire: WireResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "reasoning", "thought": true},
                    {"text": "Apex "},
                    {"text": "Logistics"}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        }))
        .unwrap();
        let response = wire.into_response().unwrap();
        assert_eq!(response.text, "Apex Logistics");
        assert_eq!(
            response.usage,
            Some(Usage {
                prompt_tokens: 12,
                completion_tokens: 3
            })
        );
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let wire: WireResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(wire.into_response(), Err(LlmError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let wire: WireResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(wire.into_response(), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn api_error_message_is_extracted() {
        let body = r#"{"error": {"code": 403, "message": "Permission denied"}}"#;
        assert_eq!(extract_error_message(body), "Permission denied");
        assert_eq!(extract_error_message("plain"), "plain");
    }
}
