//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the generator.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the storybook generator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorybookConfig {
    /// Text-generation API settings.
    pub text: TextConfig,

    /// Image-generation API settings.
    pub image: ImageConfig,

    /// Document conversion chain.
    pub convert: ConvertConfig,

    /// Rate budgets per API class.
    pub rate_limits: RateLimitsConfig,

    /// Retry policies per operation kind.
    pub retries: RetriesConfig,

    /// Story shape and output locations.
    pub story: StoryConfig,

    /// Daily usage tracking.
    pub usage: UsageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Text-generation (Gemini) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TextConfig {
    /// Base URL of the generative language API.
    pub api_base: String,

    /// Model ids, tried in order.
    pub models: Vec<String>,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            models: vec!["gemini-2.0-flash-exp".to_string()],
            api_key_env: "GOOGLE_API_KEY".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 2048,
            request_timeout_secs: 60,
        }
    }
}

/// Image-generation (Hugging Face inference) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Inference endpoint of the image model.
    pub api_url: String,

    /// Environment variable holding the API token.
    pub api_key_env: String,

    pub guidance_scale: f32,
    pub num_inference_steps: u32,
    pub width: u32,
    pub height: u32,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Chapters illustrated concurrently (1 = sequential).
    pub concurrency: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-dev"
                .to_string(),
            api_key_env: "HUGGINGFACE_API_KEY".to_string(),
            guidance_scale: 7.5,
            num_inference_steps: 50,
            width: 1024,
            height: 1024,
            request_timeout_secs: 60,
            concurrency: 1,
        }
    }
}

/// A document converter known to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    Weasyprint,
    Mdpdf,
    Wkhtmltopdf,
    Html,
}

impl ConverterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConverterKind::Weasyprint => "weasyprint",
            ConverterKind::Mdpdf => "mdpdf",
            ConverterKind::Wkhtmltopdf => "wkhtmltopdf",
            ConverterKind::Html => "html",
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Converters in order of preference.
    pub methods: Vec<ConverterKind>,

    /// PDFs smaller than this are treated as failed conversions.
    pub min_pdf_bytes: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            methods: vec![
                ConverterKind::Weasyprint,
                ConverterKind::Mdpdf,
                ConverterKind::Wkhtmltopdf,
                ConverterKind::Html,
            ],
            min_pdf_bytes: 1000,
        }
    }
}

/// A rolling-window operation budget.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateBudgetConfig {
    /// Operations allowed per window (0 = unlimited).
    pub max_operations: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Extra wait added once the oldest operation leaves the window.
    pub padding_ms: u64,
}

impl Default for RateBudgetConfig {
    fn default() -> Self {
        Self {
            max_operations: 15,
            window_secs: 60,
            padding_ms: 1000,
        }
    }
}

/// Rate budgets per API class.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    pub text: RateBudgetConfig,
    pub image: RateBudgetConfig,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            text: RateBudgetConfig::default(),
            image: RateBudgetConfig {
                max_operations: 5,
                window_secs: 60,
                padding_ms: 1000,
            },
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per backend (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Growth factor applied per attempt.
    pub multiplier: f64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% jitter (still capped at `max_delay_ms`).
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 30_000,
            multiplier: 2.0,
            max_delay_ms: 300_000,
            jitter: false,
        }
    }
}

/// Retry policies per operation kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetriesConfig {
    pub text: RetryConfig,
    pub image: RetryConfig,
    pub convert: RetryConfig,
}

impl Default for RetriesConfig {
    fn default() -> Self {
        Self {
            text: RetryConfig::default(),
            image: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 10_000,
                multiplier: 2.0,
                max_delay_ms: 60_000,
                jitter: false,
            },
            convert: RetryConfig {
                max_attempts: 1,
                base_delay_ms: 0,
                multiplier: 1.0,
                max_delay_ms: 0,
                jitter: false,
            },
        }
    }
}

/// Story shape and output locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Number of chapters in the outline.
    pub chapters: usize,

    /// Target length of each chapter.
    pub words_per_chapter: usize,

    /// Age range mentioned in prompts.
    pub audience: String,

    /// Directory receiving the markdown, document and images.
    pub output_dir: PathBuf,

    /// File name of the markdown output.
    pub markdown_file: String,

    /// Stop starting new external calls after this many seconds.
    pub max_duration_secs: Option<u64>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            chapters: 5,
            words_per_chapter: 100,
            audience: "4-8".to_string(),
            output_dir: PathBuf::from("."),
            markdown_file: "story.md".to_string(),
            max_duration_secs: None,
        }
    }
}

/// Daily usage tracking.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Warn once the daily request count goes above this.
    pub daily_warning_threshold: u64,

    /// JSON file holding today's request count between runs.
    pub state_file: PathBuf,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            daily_warning_threshold: 1200,
            state_file: PathBuf::from(".storybook-usage.json"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
