//! Concrete backends for each external operation kind.
//!
//! # Data Flow
//! ```text
//! text-gen:    text.rs    → Gemini generateContent, one backend per model
//! image-gen:   image.rs   → Hugging Face inference endpoint
//! pdf-convert: convert/   → weasyprint → mdpdf → wkhtmltopdf → html export
//!                http.rs  → status/transport classification for the APIs
//! ```

pub mod convert;
pub mod http;
pub mod image;
pub mod text;

pub use convert::{conversion_chain, ConversionJob, Converter, DocumentFormat, SharedConverter};
pub use http::build_client;
pub use image::{image_chain, InferenceBackend};
pub use text::{text_chain, GeminiBackend};

use std::sync::Arc;

use crate::config::{Secrets, StorybookConfig};
use crate::resilience::FallbackChain;

/// Every chain the generator calls through, built once at startup.
pub struct Chains {
    pub text: FallbackChain<Arc<GeminiBackend>>,
    pub image: FallbackChain<Arc<InferenceBackend>>,
    pub convert: FallbackChain<SharedConverter>,
}

impl Chains {
    /// Build the API chains and detect the installed converters.
    pub async fn from_config(
        config: &StorybookConfig,
        secrets: &Secrets,
    ) -> Result<Self, reqwest::Error> {
        let client = build_client()?;
        Ok(Self {
            text: text_chain(&client, &config.text, secrets),
            image: image_chain(&client, &config.image, secrets),
            convert: conversion_chain(&config.convert).await,
        })
    }
}
