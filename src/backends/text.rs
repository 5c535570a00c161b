//! Text generation through the Gemini `generateContent` API.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backends::http::{classify_status, classify_transport};
use crate::config::{Secrets, TextConfig};
use crate::resilience::{Backend, CallError, FallbackChain, OperationKind};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// One Gemini model reachable over HTTP.
#[derive(Clone)]
pub struct GeminiBackend {
    id: String,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client, config: &TextConfig, model: &str, api_key: &str) -> Self {
        Self {
            id: model.to_string(),
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.api_base.trim_end_matches('/'),
                model
            ),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            generation: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: config.max_output_tokens,
            },
            client,
        }
    }

    /// Send one prompt and return the concatenated text of the first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String, CallError> {
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: self.generation,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(|e| classify_transport(&e))?;

        if !status.is_success() {
            return Err(classify_status(status, &headers, &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| CallError::backend(format!("malformed response: {e}")))?;
        extract_text(parsed)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, CallError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(CallError::backend(format!("prompt blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| CallError::backend("response has no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(CallError::backend(format!("empty completion (finish reason {reason})")));
    }
    Ok(text)
}

impl Backend for GeminiBackend {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One backend per configured model, in configured order.
pub fn text_chain(
    client: &reqwest::Client,
    config: &TextConfig,
    secrets: &Secrets,
) -> FallbackChain<Arc<GeminiBackend>> {
    let backends = config
        .models
        .iter()
        .map(|model| Arc::new(GeminiBackend::new(client.clone(), config, model, &secrets.text_api_key)))
        .collect();
    FallbackChain::new(OperationKind::TextGeneration, backends)
}
