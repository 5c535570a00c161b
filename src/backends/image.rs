//! Image generation through the Hugging Face inference API.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::backends::http::{classify_status, classify_transport};
use crate::config::{ImageConfig, Secrets};
use crate::resilience::{Backend, CallError, FallbackChain, OperationKind};

/// Appended to every scene description.
pub const ILLUSTRATION_STYLE: &str = "Style: Children's storybook illustration with vivid colors, \
especially azure and emerald tones with gold accents. The illustration should have the whimsical \
quality of early 20th-century storybook art, blending realism with fantasy elements. Rich \
textures, soft luminous lighting, magical atmosphere with depth and dimensionality. No text in \
the image.";

#[derive(Debug, Clone, Copy, Serialize)]
struct Parameters {
    guidance_scale: f32,
    num_inference_steps: u32,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: Parameters,
}

/// A text-to-image model behind an inference endpoint.
#[derive(Clone)]
pub struct InferenceBackend {
    id: String,
    url: String,
    api_key: String,
    timeout: Duration,
    parameters: Parameters,
    client: reqwest::Client,
}

impl std::fmt::Debug for InferenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceBackend")
            .field("id", &self.id)
            .field("url", &self.url)
            .finish()
    }
}

impl InferenceBackend {
    pub fn new(client: reqwest::Client, config: &ImageConfig, api_key: &str) -> Self {
        Self {
            id: model_id(&config.api_url),
            url: config.api_url.clone(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            parameters: Parameters {
                guidance_scale: config.guidance_scale,
                num_inference_steps: config.num_inference_steps,
                width: config.width,
                height: config.height,
            },
            client,
        }
    }

    /// Generate an image for `prompt`; returns the raw image bytes.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>, CallError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&InferenceRequest {
                inputs: prompt,
                parameters: self.parameters,
            })
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &headers, &body));
        }

        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        Ok(bytes.to_vec())
    }
}

impl Backend for InferenceBackend {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Last path segment of the endpoint, e.g. `FLUX.1-dev`.
fn model_id(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("image-model")
        .to_string()
}

/// Full prompt for one chapter scene.
pub fn illustration_prompt(scene: &str) -> String {
    format!("{}\n\n{}", scene.trim(), ILLUSTRATION_STYLE)
}

/// True if `bytes` start with a PNG, JPEG, GIF or WebP signature.
pub fn looks_like_image(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(b"GIF8")
        || (bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP")
}

pub fn image_chain(
    client: &reqwest::Client,
    config: &ImageConfig,
    secrets: &Secrets,
) -> FallbackChain<Arc<InferenceBackend>> {
    FallbackChain::new(
        OperationKind::ImageGeneration,
        vec![Arc::new(InferenceBackend::new(client.clone(), config, &secrets.image_api_key))],
    )
}
