//! Markdown to PDF/HTML conversion engines.
//!
//! # Responsibilities
//! - Wrap each external engine as a `Converter` in the fallback chain
//! - Detect engines once so the chain only holds installed ones
//! - Always end the chain with the HTML export
//!
//! # Design Decisions
//! - A missing executable is `Unavailable`, a failing run is `Backend`
//! - Converters only produce files; the size check belongs to the caller

pub mod command;
pub mod html;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::{ConvertConfig, ConverterKind};
use crate::document;
use crate::resilience::{Backend, CallError, FallbackChain, OperationKind};

pub use command::CommandConverter;
pub use html::HtmlExport;

/// What a converter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Html,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Html => "html",
        }
    }
}

/// Inputs and output locations for converting one markdown file.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub markdown_path: PathBuf,
    /// Directory relative image paths resolve against.
    pub base_dir: PathBuf,
    pub pdf_path: PathBuf,
    pub html_path: PathBuf,
    /// Markdown after placeholder and chapter-break rewriting.
    pub preprocessed: String,
    pub print_html: String,
    pub browser_html: String,
}

impl ConversionJob {
    /// Prepare every rendering of `markdown`, which was read from `markdown_path`.
    pub fn new(markdown_path: &Path, markdown: &str) -> Self {
        let base_dir = markdown_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        Self {
            markdown_path: markdown_path.to_path_buf(),
            base_dir,
            pdf_path: markdown_path.with_extension("pdf"),
            html_path: markdown_path.with_extension("html"),
            preprocessed: document::preprocess(markdown),
            print_html: document::print_document(markdown),
            browser_html: document::browser_document(markdown),
        }
    }

    /// Output path for `format`.
    pub fn output_path(&self, format: DocumentFormat) -> &Path {
        match format {
            DocumentFormat::Pdf => &self.pdf_path,
            DocumentFormat::Html => &self.html_path,
        }
    }
}

/// One conversion engine.
pub trait Converter: Backend + Send + Sync {
    fn format(&self) -> DocumentFormat;

    /// Whether the engine can run on this machine.
    fn detect(&self) -> BoxFuture<'_, bool>;

    /// Convert `job`, returning the path written.
    fn convert<'a>(&'a self, job: &'a ConversionJob) -> BoxFuture<'a, Result<PathBuf, CallError>>;
}

pub type SharedConverter = Arc<dyn Converter>;

/// Converter for one configured method.
pub fn converter_for(kind: ConverterKind) -> SharedConverter {
    match kind {
        ConverterKind::Html => Arc::new(HtmlExport),
        other => Arc::new(CommandConverter::new(other)),
    }
}

/// Candidates in configured order, with the HTML export appended when the
/// configuration leaves it out.
pub fn candidates(config: &ConvertConfig) -> Vec<SharedConverter> {
    let mut kinds = config.methods.clone();
    if !kinds.contains(&ConverterKind::Html) {
        kinds.push(ConverterKind::Html);
    }
    kinds.into_iter().map(converter_for).collect()
}

/// Detect every candidate and keep the available ones.
pub async fn conversion_chain(config: &ConvertConfig) -> FallbackChain<SharedConverter> {
    FallbackChain::detected(
        OperationKind::DocumentConversion,
        candidates(config),
        |converter| {
            let converter = Arc::clone(converter);
            async move { converter.detect().await }
        },
    )
    .await
}
